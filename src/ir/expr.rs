//! Expression IR definitions.
//!
//! An [`Expression`] is an immutable, reference-counted node. Each node gets a
//! fresh [`NodeId`] when it is constructed; cloning an `Expression` shares the
//! node and keeps its id. Equality and hashing are structural and ignore ids,
//! so two identical sub-trees at different positions compare equal while
//! still being distinct keys in an [`ExpressionTypes`](crate::analysis::ExpressionTypes) map.

use crate::error::{ExpressionError, ExpressionResult};
use crate::function::ResolvedFunction;
use crate::ir::operator::{ArithmeticOperator, ComparisonOperator, LogicalOperator};
use crate::types::DataType;
use crate::value::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an expression node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Named output of a plan node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    name: String,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a reference expression to this symbol
    pub fn to_reference(&self) -> Expression {
        Expression::symbol(self.name.clone())
    }
}

impl From<&SymbolReference> for Symbol {
    fn from(reference: &SymbolReference) -> Self {
        Symbol::new(reference.name.clone())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Literal value with its type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    pub data_type: DataType,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolReference {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArithmeticBinary {
    pub operator: ArithmeticOperator,
    pub function: ResolvedFunction,
    pub left: Expression,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArithmeticNegation {
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparison {
    pub operator: ComparisonOperator,
    pub left: Expression,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Between {
    pub value: Expression,
    pub min: Expression,
    pub max: Expression,
}

/// AND/OR over one or more terms
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Logical {
    pub operator: LogicalOperator,
    pub terms: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Not {
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IsNull {
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coalesce {
    pub operands: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NullIf {
    pub first: Expression,
    pub second: Expression,
}

/// One `WHEN operand THEN result` branch of a CASE
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhenClause {
    pub operand: Expression,
    pub result: Expression,
}

impl WhenClause {
    pub fn new(operand: Expression, result: Expression) -> Self {
        Self { operand, result }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchedCase {
    pub when_clauses: Vec<WhenClause>,
    pub default_value: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleCase {
    pub operand: Expression,
    pub when_clauses: Vec<WhenClause>,
    pub default_value: Option<Expression>,
}

/// `value IN (value_list)`; the list is never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InPredicate {
    pub value: Expression,
    pub value_list: Vec<Expression>,
}

/// CAST, or TRY_CAST when `safe`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cast {
    pub expression: Expression,
    pub target_type: DataType,
    pub safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    pub items: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscript {
    pub base: Expression,
    pub index: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCall {
    pub function: ResolvedFunction,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lambda {
    pub arguments: Vec<String>,
    pub body: Expression,
}

/// Partial application of `function` to the leading `values`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bind {
    pub values: Vec<Expression>,
    pub function: Expression,
}

/// The closed set of expression variants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Constant(Constant),
    SymbolReference(SymbolReference),
    ArithmeticBinary(ArithmeticBinary),
    ArithmeticNegation(ArithmeticNegation),
    Comparison(Comparison),
    Between(Between),
    Logical(Logical),
    Not(Not),
    IsNull(IsNull),
    Coalesce(Coalesce),
    NullIf(NullIf),
    SearchedCase(SearchedCase),
    SimpleCase(SimpleCase),
    In(InPredicate),
    Cast(Cast),
    Row(Row),
    Subscript(Subscript),
    FunctionCall(FunctionCall),
    Lambda(Lambda),
    Bind(Bind),
}

/// Immutable expression node
#[derive(Clone)]
pub struct Expression {
    id: NodeId,
    kind: Arc<ExprKind>,
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            id: NodeId::next(),
            kind: Arc::new(kind),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Whether both handles refer to the same node
    pub fn same_node(&self, other: &Expression) -> bool {
        self.id == other.id
    }

    /// Create a constant expression
    pub fn constant(data_type: DataType, value: Value) -> Self {
        Self::new(ExprKind::Constant(Constant { data_type, value }))
    }

    /// Create a typed NULL
    pub fn null(data_type: DataType) -> Self {
        Self::constant(data_type, Value::Null)
    }

    pub fn boolean(value: bool) -> Self {
        Self::constant(DataType::Boolean, Value::Boolean(value))
    }

    pub fn integer(value: i32) -> Self {
        Self::constant(DataType::Integer, Value::Integer(value))
    }

    pub fn bigint(value: i64) -> Self {
        Self::constant(DataType::BigInt, Value::BigInt(value))
    }

    pub fn double(value: f64) -> Self {
        Self::constant(DataType::Double, Value::Double(value))
    }

    pub fn varchar(value: impl Into<String>) -> Self {
        Self::constant(DataType::Varchar, Value::varchar(value))
    }

    /// Create a DATE constant from days since the epoch
    pub fn date(days: i32) -> Self {
        Self::constant(DataType::Date, Value::Date(days))
    }

    /// Create a symbol reference
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(ExprKind::SymbolReference(SymbolReference { name: name.into() }))
    }

    pub fn arithmetic(
        operator: ArithmeticOperator,
        function: ResolvedFunction,
        left: Expression,
        right: Expression,
    ) -> Self {
        Self::new(ExprKind::ArithmeticBinary(ArithmeticBinary {
            operator,
            function,
            left,
            right,
        }))
    }

    pub fn negation(value: Expression) -> Self {
        Self::new(ExprKind::ArithmeticNegation(ArithmeticNegation { value }))
    }

    pub fn comparison(operator: ComparisonOperator, left: Expression, right: Expression) -> Self {
        Self::new(ExprKind::Comparison(Comparison {
            operator,
            left,
            right,
        }))
    }

    /// Create an `=` comparison
    pub fn equal(left: Expression, right: Expression) -> Self {
        Self::comparison(ComparisonOperator::Equal, left, right)
    }

    pub fn between(value: Expression, min: Expression, max: Expression) -> Self {
        Self::new(ExprKind::Between(Between { value, min, max }))
    }

    pub fn logical(operator: LogicalOperator, terms: Vec<Expression>) -> Self {
        Self::new(ExprKind::Logical(Logical { operator, terms }))
    }

    /// Create an AND expression
    pub fn and(terms: Vec<Expression>) -> Self {
        Self::logical(LogicalOperator::And, terms)
    }

    /// Create an OR expression
    pub fn or(terms: Vec<Expression>) -> Self {
        Self::logical(LogicalOperator::Or, terms)
    }

    /// Create a NOT expression
    pub fn not(value: Expression) -> Self {
        Self::new(ExprKind::Not(Not { value }))
    }

    pub fn is_null(value: Expression) -> Self {
        Self::new(ExprKind::IsNull(IsNull { value }))
    }

    pub fn coalesce(operands: Vec<Expression>) -> Self {
        Self::new(ExprKind::Coalesce(Coalesce { operands }))
    }

    pub fn null_if(first: Expression, second: Expression) -> Self {
        Self::new(ExprKind::NullIf(NullIf { first, second }))
    }

    pub fn searched_case(when_clauses: Vec<WhenClause>, default_value: Option<Expression>) -> Self {
        Self::new(ExprKind::SearchedCase(SearchedCase {
            when_clauses,
            default_value,
        }))
    }

    pub fn simple_case(
        operand: Expression,
        when_clauses: Vec<WhenClause>,
        default_value: Option<Expression>,
    ) -> Self {
        Self::new(ExprKind::SimpleCase(SimpleCase {
            operand,
            when_clauses,
            default_value,
        }))
    }

    pub fn in_list(value: Expression, value_list: Vec<Expression>) -> Self {
        Self::new(ExprKind::In(InPredicate { value, value_list }))
    }

    pub fn cast(expression: Expression, target_type: DataType) -> Self {
        Self::new(ExprKind::Cast(Cast {
            expression,
            target_type,
            safe: false,
        }))
    }

    /// Create a cast that yields NULL instead of failing
    pub fn try_cast(expression: Expression, target_type: DataType) -> Self {
        Self::new(ExprKind::Cast(Cast {
            expression,
            target_type,
            safe: true,
        }))
    }

    pub fn row(items: Vec<Expression>) -> Self {
        Self::new(ExprKind::Row(Row { items }))
    }

    pub fn subscript(base: Expression, index: Expression) -> Self {
        Self::new(ExprKind::Subscript(Subscript { base, index }))
    }

    pub fn call(function: ResolvedFunction, arguments: Vec<Expression>) -> Self {
        Self::new(ExprKind::FunctionCall(FunctionCall {
            function,
            arguments,
        }))
    }

    pub fn lambda(arguments: Vec<String>, body: Expression) -> Self {
        Self::new(ExprKind::Lambda(Lambda { arguments, body }))
    }

    pub fn bind(values: Vec<Expression>, function: Expression) -> Self {
        Self::new(ExprKind::Bind(Bind { values, function }))
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self.kind() {
            ExprKind::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self.kind() {
            ExprKind::SymbolReference(reference) => Some(Symbol::from(reference)),
            _ => None,
        }
    }

    /// Whether this is a NULL literal of any type
    pub fn is_null_constant(&self) -> bool {
        self.as_constant().map_or(false, |c| c.value.is_null())
    }

    /// Whether this is the boolean literal TRUE
    pub fn is_true_constant(&self) -> bool {
        self.as_constant()
            .map_or(false, |c| c.value == Value::Boolean(true))
    }

    /// Whether this is the boolean literal FALSE
    pub fn is_false_constant(&self) -> bool {
        self.as_constant()
            .map_or(false, |c| c.value == Value::Boolean(false))
    }

    /// Direct child expressions, in evaluation order
    pub fn children(&self) -> Vec<&Expression> {
        match self.kind() {
            ExprKind::Constant(_) | ExprKind::SymbolReference(_) => vec![],
            ExprKind::ArithmeticBinary(node) => vec![&node.left, &node.right],
            ExprKind::ArithmeticNegation(node) => vec![&node.value],
            ExprKind::Comparison(node) => vec![&node.left, &node.right],
            ExprKind::Between(node) => vec![&node.value, &node.min, &node.max],
            ExprKind::Logical(node) => node.terms.iter().collect(),
            ExprKind::Not(node) => vec![&node.value],
            ExprKind::IsNull(node) => vec![&node.value],
            ExprKind::Coalesce(node) => node.operands.iter().collect(),
            ExprKind::NullIf(node) => vec![&node.first, &node.second],
            ExprKind::SearchedCase(node) => {
                let mut children = Vec::with_capacity(node.when_clauses.len() * 2 + 1);
                for clause in &node.when_clauses {
                    children.push(&clause.operand);
                    children.push(&clause.result);
                }
                children.extend(node.default_value.iter());
                children
            }
            ExprKind::SimpleCase(node) => {
                let mut children = vec![&node.operand];
                for clause in &node.when_clauses {
                    children.push(&clause.operand);
                    children.push(&clause.result);
                }
                children.extend(node.default_value.iter());
                children
            }
            ExprKind::In(node) => std::iter::once(&node.value)
                .chain(node.value_list.iter())
                .collect(),
            ExprKind::Cast(node) => vec![&node.expression],
            ExprKind::Row(node) => node.items.iter().collect(),
            ExprKind::Subscript(node) => vec![&node.base, &node.index],
            ExprKind::FunctionCall(node) => node.arguments.iter().collect(),
            ExprKind::Lambda(node) => vec![&node.body],
            ExprKind::Bind(node) => node
                .values
                .iter()
                .chain(std::iter::once(&node.function))
                .collect(),
        }
    }

    /// Build a new node of the same variant over replacement children, given
    /// in the order returned by [`Expression::children`]
    pub fn replace_children(&self, children: Vec<Expression>) -> ExpressionResult<Expression> {
        let expected = self.children().len();
        if children.len() != expected {
            return Err(ExpressionError::ArgumentCount {
                function: format!("replace_children of {}", self),
                expected,
                actual: children.len(),
            });
        }
        let mut next = children.into_iter();
        let mut take = move || next.next().ok_or_else(|| ExpressionError::NotSupported("missing child".to_string()));

        let kind = match self.kind() {
            ExprKind::Constant(_) | ExprKind::SymbolReference(_) => return Ok(self.clone()),
            ExprKind::ArithmeticBinary(node) => ExprKind::ArithmeticBinary(ArithmeticBinary {
                operator: node.operator,
                function: node.function.clone(),
                left: take()?,
                right: take()?,
            }),
            ExprKind::ArithmeticNegation(_) => {
                ExprKind::ArithmeticNegation(ArithmeticNegation { value: take()? })
            }
            ExprKind::Comparison(node) => ExprKind::Comparison(Comparison {
                operator: node.operator,
                left: take()?,
                right: take()?,
            }),
            ExprKind::Between(_) => ExprKind::Between(Between {
                value: take()?,
                min: take()?,
                max: take()?,
            }),
            ExprKind::Logical(node) => ExprKind::Logical(Logical {
                operator: node.operator,
                terms: (0..expected).map(|_| take()).collect::<ExpressionResult<_>>()?,
            }),
            ExprKind::Not(_) => ExprKind::Not(Not { value: take()? }),
            ExprKind::IsNull(_) => ExprKind::IsNull(IsNull { value: take()? }),
            ExprKind::Coalesce(_) => ExprKind::Coalesce(Coalesce {
                operands: (0..expected).map(|_| take()).collect::<ExpressionResult<_>>()?,
            }),
            ExprKind::NullIf(_) => ExprKind::NullIf(NullIf {
                first: take()?,
                second: take()?,
            }),
            ExprKind::SearchedCase(node) => {
                let mut when_clauses = Vec::with_capacity(node.when_clauses.len());
                for _ in &node.when_clauses {
                    when_clauses.push(WhenClause::new(take()?, take()?));
                }
                let default_value = match node.default_value {
                    Some(_) => Some(take()?),
                    None => None,
                };
                ExprKind::SearchedCase(SearchedCase {
                    when_clauses,
                    default_value,
                })
            }
            ExprKind::SimpleCase(node) => {
                let operand = take()?;
                let mut when_clauses = Vec::with_capacity(node.when_clauses.len());
                for _ in &node.when_clauses {
                    when_clauses.push(WhenClause::new(take()?, take()?));
                }
                let default_value = match node.default_value {
                    Some(_) => Some(take()?),
                    None => None,
                };
                ExprKind::SimpleCase(SimpleCase {
                    operand,
                    when_clauses,
                    default_value,
                })
            }
            ExprKind::In(node) => ExprKind::In(InPredicate {
                value: take()?,
                value_list: (0..node.value_list.len())
                    .map(|_| take())
                    .collect::<ExpressionResult<_>>()?,
            }),
            ExprKind::Cast(node) => ExprKind::Cast(Cast {
                expression: take()?,
                target_type: node.target_type.clone(),
                safe: node.safe,
            }),
            ExprKind::Row(_) => ExprKind::Row(Row {
                items: (0..expected).map(|_| take()).collect::<ExpressionResult<_>>()?,
            }),
            ExprKind::Subscript(_) => ExprKind::Subscript(Subscript {
                base: take()?,
                index: take()?,
            }),
            ExprKind::FunctionCall(node) => ExprKind::FunctionCall(FunctionCall {
                function: node.function.clone(),
                arguments: (0..expected).map(|_| take()).collect::<ExpressionResult<_>>()?,
            }),
            ExprKind::Lambda(node) => ExprKind::Lambda(Lambda {
                arguments: node.arguments.clone(),
                body: take()?,
            }),
            ExprKind::Bind(node) => ExprKind::Bind(Bind {
                values: (0..node.values.len())
                    .map(|_| take())
                    .collect::<ExpressionResult<_>>()?,
                function: take()?,
            }),
        };
        Ok(Expression::new(kind))
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.kind, &other.kind) || self.kind == other.kind
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_when_clauses(
    f: &mut fmt::Formatter<'_>,
    when_clauses: &[WhenClause],
    default_value: &Option<Expression>,
) -> fmt::Result {
    for clause in when_clauses {
        write!(f, " WHEN {} THEN {}", clause.operand, clause.result)?;
    }
    if let Some(default_value) = default_value {
        write!(f, " ELSE {}", default_value)?;
    }
    write!(f, " END")
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant(node) => write!(f, "{}", node.value),
            ExprKind::SymbolReference(node) => write!(f, "{}", node.name),
            ExprKind::ArithmeticBinary(node) => {
                write!(f, "({} {} {})", node.left, node.operator.as_str(), node.right)
            }
            ExprKind::ArithmeticNegation(node) => write!(f, "-({})", node.value),
            ExprKind::Comparison(node) => {
                write!(f, "({} {} {})", node.left, node.operator.as_str(), node.right)
            }
            ExprKind::Between(node) => {
                write!(f, "({} BETWEEN {} AND {})", node.value, node.min, node.max)
            }
            ExprKind::Logical(node) => {
                write!(f, "(")?;
                for (i, term) in node.terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", node.operator.as_str())?;
                    }
                    write!(f, "{}", term)?;
                }
                write!(f, ")")
            }
            ExprKind::Not(node) => write!(f, "(NOT {})", node.value),
            ExprKind::IsNull(node) => write!(f, "({} IS NULL)", node.value),
            ExprKind::Coalesce(node) => {
                write!(f, "COALESCE(")?;
                write_list(f, &node.operands)?;
                write!(f, ")")
            }
            ExprKind::NullIf(node) => write!(f, "NULLIF({}, {})", node.first, node.second),
            ExprKind::SearchedCase(node) => {
                write!(f, "CASE")?;
                write_when_clauses(f, &node.when_clauses, &node.default_value)
            }
            ExprKind::SimpleCase(node) => {
                write!(f, "CASE {}", node.operand)?;
                write_when_clauses(f, &node.when_clauses, &node.default_value)
            }
            ExprKind::In(node) => {
                write!(f, "({} IN (", node.value)?;
                write_list(f, &node.value_list)?;
                write!(f, "))")
            }
            ExprKind::Cast(node) => {
                let name = if node.safe { "TRY_CAST" } else { "CAST" };
                write!(f, "{}({} AS {})", name, node.expression, node.target_type)
            }
            ExprKind::Row(node) => {
                write!(f, "ROW(")?;
                write_list(f, &node.items)?;
                write!(f, ")")
            }
            ExprKind::Subscript(node) => write!(f, "{}[{}]", node.base, node.index),
            ExprKind::FunctionCall(node) => {
                write!(f, "{}(", node.function)?;
                write_list(f, &node.arguments)?;
                write!(f, ")")
            }
            ExprKind::Lambda(node) => {
                write!(f, "({}) -> {}", node.arguments.join(", "), node.body)
            }
            ExprKind::Bind(node) => {
                write!(f, "BIND(")?;
                write_list(f, &node.values)?;
                write!(f, ", {})", node.function)
            }
        }
    }
}
