use relsparql_model::{Literal, NamedNode, Variable};
use std::fmt::{Display, Formatter};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Display for ComparisonOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterOrEqual => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Display for ArithmeticOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
        };
        write!(f, "{symbol}")
    }
}

/// The supported built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Str,
    Lang,
    Datatype,
    LangMatches,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Regex,
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Function::Str => "STR",
            Function::Lang => "LANG",
            Function::Datatype => "DATATYPE",
            Function::LangMatches => "LANGMATCHES",
            Function::IsIri => "isIRI",
            Function::IsBlank => "isBLANK",
            Function::IsLiteral => "isLITERAL",
            Function::IsNumeric => "isNUMERIC",
            Function::Regex => "REGEX",
        };
        write!(f, "{name}")
    }
}

/// A SPARQL expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Variable(Variable),
    NamedNode(NamedNode),
    Literal(Literal),
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Compare(ComparisonOperator, Box<Expression>, Box<Expression>),
    SameTerm(Box<Expression>, Box<Expression>),
    Arithmetic(ArithmeticOperator, Box<Expression>, Box<Expression>),
    UnaryPlus(Box<Expression>),
    UnaryMinus(Box<Expression>),
    Bound(Variable),
    If(Box<Expression>, Box<Expression>, Box<Expression>),
    Coalesce(Vec<Expression>),
    In(Box<Expression>, Vec<Expression>),
    FunctionCall(Function, Vec<Expression>),
}

impl Expression {
    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    pub fn compare(operator: ComparisonOperator, left: Expression, right: Expression) -> Self {
        Expression::Compare(operator, Box::new(left), Box::new(right))
    }

    /// Conjoins an optional expression with `other`.
    pub fn and_option(left: Option<Expression>, other: Expression) -> Self {
        match left {
            Some(left) => Self::and(left, other),
            None => other,
        }
    }

    /// The boolean value of a constant expression, if it is a boolean literal.
    pub fn as_constant_boolean(&self) -> Option<bool> {
        match self {
            Expression::Literal(literal)
                if literal.datatype() == relsparql_model::vocab::xsd::BOOLEAN =>
            {
                match literal.value() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Variable(variable) => write!(f, "{variable}"),
            Expression::NamedNode(node) => write!(f, "{node}"),
            Expression::Literal(literal) => write!(f, "{literal}"),
            Expression::Or(left, right) => write!(f, "({left} || {right})"),
            Expression::And(left, right) => write!(f, "({left} && {right})"),
            Expression::Not(inner) => write!(f, "!{inner}"),
            Expression::Compare(operator, left, right) => {
                write!(f, "({left} {operator} {right})")
            }
            Expression::SameTerm(left, right) => write!(f, "sameTerm({left}, {right})"),
            Expression::Arithmetic(operator, left, right) => {
                write!(f, "({left} {operator} {right})")
            }
            Expression::UnaryPlus(inner) => write!(f, "+{inner}"),
            Expression::UnaryMinus(inner) => write!(f, "-{inner}"),
            Expression::Bound(variable) => write!(f, "BOUND({variable})"),
            Expression::If(test, then, otherwise) => {
                write!(f, "IF({test}, {then}, {otherwise})")
            }
            Expression::Coalesce(args) => write_call(f, "COALESCE", args),
            Expression::In(needle, haystack) => {
                write!(f, "{needle} ")?;
                write_call(f, "IN", haystack)
            }
            Expression::FunctionCall(function, args) => {
                write_call(f, &function.to_string(), args)
            }
        }
    }
}

fn write_call(f: &mut Formatter<'_>, name: &str, args: &[Expression]) -> std::fmt::Result {
    write!(f, "{name}(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

/// An ordering criterion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderExpression {
    Asc(Expression),
    Desc(Expression),
}

impl OrderExpression {
    pub fn expression(&self) -> &Expression {
        match self {
            OrderExpression::Asc(expression) | OrderExpression::Desc(expression) => expression,
        }
    }

    pub fn is_ascending(&self) -> bool {
        matches!(self, OrderExpression::Asc(_))
    }
}
