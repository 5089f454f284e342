use crate::span::Node;

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit(pub Vec<Node<ExternalDeclaration>>);

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDeclaration {
    Declaration(Node<Declaration>),
    StaticAssert(Node<StaticAssert>),
}

/**
 * `_Static_assert(expression, message)`.
 *
 * `text` is the spelling of the expression tokens after macro expansion.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAssert {
    pub expression: Box<Node<Expression>>,
    pub message: Option<Node<String>>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub specifiers: Vec<Node<DeclarationSpecifier>>,
    pub declarators: Vec<Node<InitDeclarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationSpecifier {
    StorageClass(Node<StorageClassSpecifier>),
    TypeSpecifier(Node<TypeSpecifier>),
    TypeQualifier(Node<TypeQualifier>),
    Function(Node<FunctionSpecifier>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClassSpecifier {
    Typedef,
    Extern,
    Static,
    ThreadLocal,
    Auto,
    Register,
    Constexpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpecifier {
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    Int128,
    BitInt(Box<Node<Expression>>),
    Enum(Node<EnumType>),
    TypedefName(Node<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeQualifier {
    Const,
    Volatile,
    Restrict,
    Atomic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionSpecifier {
    Inline,
    Noreturn,
}

/**
 * `enum name : fixed_type { enumerators }`. A missing list means a reference to a declared enum.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub identifier: Option<Node<String>>,
    pub fixed_type: Option<Box<Node<TypeName>>>,
    pub enumerators: Option<Vec<Node<Enumerator>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerator {
    pub identifier: Node<String>,
    pub expression: Option<Box<Node<Expression>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitDeclarator {
    pub declarator: Node<Declarator>,
    pub initializer: Option<Node<Initializer>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expression(Box<Node<Expression>>),
    List(Vec<Node<Initializer>>),
}

/**
 * A declarator. `derived` is listed in the order the derivations apply to the base type:
 * `*x[3]` gives `[Pointer, Array(3)]`.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub identifier: Option<Node<String>>,
    pub derived: Vec<Node<DerivedDeclarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DerivedDeclarator {
    Pointer(Vec<Node<TypeQualifier>>),
    Array(Option<Box<Node<Expression>>>),
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub specifiers: Vec<Node<DeclarationSpecifier>>,
    pub declarator: Option<Node<Declarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Integer(String),
    Character(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Complement,
    Negate,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    Address,
    Indirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Multiply,
    Divide,
    Modulo,
    Plus,
    Minus,
    ShiftLeft,
    ShiftRight,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Equals,
    NotEquals,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    Index,
    Assign,
    AssignMultiply,
    AssignDivide,
    AssignModulo,
    AssignPlus,
    AssignMinus,
    AssignShiftLeft,
    AssignShiftRight,
    AssignBitwiseAnd,
    AssignBitwiseXor,
    AssignBitwiseOr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenericAssociation {
    Type(Node<TypeName>, Box<Node<Expression>>),
    Default(Box<Node<Expression>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(String),
    Constant(Constant),
    StringLiteral(Vec<String>),
    UnaryOperator(Node<UnaryOperator>, Box<Node<Expression>>),
    BinaryOperator(Node<BinaryOperator>, Box<Node<Expression>>, Box<Node<Expression>>),
    Conditional(Box<Node<Expression>>, Box<Node<Expression>>, Box<Node<Expression>>),
    Cast(Box<Node<TypeName>>, Box<Node<Expression>>),
    SizeOfTy(Box<Node<TypeName>>),
    SizeOfVal(Box<Node<Expression>>),
    AlignOf(Box<Node<TypeName>>),
    GenericSelection(Box<Node<Expression>>, Vec<Node<GenericAssociation>>),
    Call(Box<Node<Expression>>, Vec<Node<Expression>>),
    Member(Box<Node<Expression>>, String),
    Comma(Vec<Node<Expression>>),
}

impl std::fmt::Display for StorageClassSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StorageClassSpecifier::Typedef => "typedef",
            StorageClassSpecifier::Extern => "extern",
            StorageClassSpecifier::Static => "static",
            StorageClassSpecifier::ThreadLocal => "_Thread_local",
            StorageClassSpecifier::Auto => "auto",
            StorageClassSpecifier::Register => "register",
            StorageClassSpecifier::Constexpr => "constexpr",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use BinaryOperator::*;
        let s = match self {
            Multiply => "*",
            Divide => "/",
            Modulo => "%",
            Plus => "+",
            Minus => "-",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            Less => "<",
            Greater => ">",
            LessOrEqual => "<=",
            GreaterOrEqual => ">=",
            Equals => "==",
            NotEquals => "!=",
            BitwiseAnd => "&",
            BitwiseXor => "^",
            BitwiseOr => "|",
            LogicalAnd => "&&",
            LogicalOr => "||",
            Index => "[]",
            Assign => "=",
            AssignMultiply => "*=",
            AssignDivide => "/=",
            AssignModulo => "%=",
            AssignPlus => "+=",
            AssignMinus => "-=",
            AssignShiftLeft => "<<=",
            AssignShiftRight => ">>=",
            AssignBitwiseAnd => "&=",
            AssignBitwiseXor => "^=",
            AssignBitwiseOr => "|=",
        };
        f.write_str(s)
    }
}
