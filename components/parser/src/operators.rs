//! Operator table
//!
//! Every operator the expression parser understands is described once here:
//! its token, whether it is read in prefix or infix/postfix position, its
//! precedence and associativity, an optional secondary (closing) token, and
//! how many operands a well-formed node carries. The table is built on first
//! use and is immutable afterwards.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::lexer::{Keyword, Punctuator, Token};

/// Token an operator is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorToken {
    /// A punctuator such as `+` or `(`
    Punct(Punctuator),
    /// A keyword operator such as `typeof` or `in`
    Keyword(Keyword),
    /// A template literal in operator position (tagged template)
    Template,
}

impl OperatorToken {
    /// Classifies a lexer token as a potential operator token.
    pub fn from_token(token: &Token) -> Option<OperatorToken> {
        match token {
            Token::Punctuator(p) => Some(OperatorToken::Punct(*p)),
            Token::Keyword(k) => Some(OperatorToken::Keyword(*k)),
            Token::TemplateLiteral(_) | Token::TemplateHead(_) => Some(OperatorToken::Template),
            _ => None,
        }
    }
}

/// Position an operator is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixity {
    /// No left operand: the operator starts an operand
    Prefix,
    /// Follows a complete left operand
    InfixOrPostfix,
}

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    /// `a - b - c` is `(a - b) - c`
    Left,
    /// `a = b = c` is `a = (b = c)`
    Right,
}

/// Semantic identity of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OperatorKind {
    Comma,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ExpAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    UnsignedShiftRightAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    Conditional,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    In,
    Instanceof,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Exponent,
    Positive,
    Negate,
    LogicalNot,
    BitNot,
    Typeof,
    Void,
    Delete,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    New,
    FunctionCall,
    Index,
    MemberAccess,
    TaggedTemplate,
    Grouping,
}

impl OperatorKind {
    /// For compound assignments, the binary operator applied before storing.
    pub fn compound_base(&self) -> Option<OperatorKind> {
        Some(match self {
            OperatorKind::AddAssign => OperatorKind::Add,
            OperatorKind::SubAssign => OperatorKind::Subtract,
            OperatorKind::MulAssign => OperatorKind::Multiply,
            OperatorKind::DivAssign => OperatorKind::Divide,
            OperatorKind::ModAssign => OperatorKind::Modulo,
            OperatorKind::ExpAssign => OperatorKind::Exponent,
            OperatorKind::ShiftLeftAssign => OperatorKind::ShiftLeft,
            OperatorKind::ShiftRightAssign => OperatorKind::ShiftRight,
            OperatorKind::UnsignedShiftRightAssign => OperatorKind::UnsignedShiftRight,
            OperatorKind::BitAndAssign => OperatorKind::BitAnd,
            OperatorKind::BitOrAssign => OperatorKind::BitOr,
            OperatorKind::BitXorAssign => OperatorKind::BitXor,
            _ => return None,
        })
    }

    /// Operators whose first operand is written to.
    pub fn is_assignment(&self) -> bool {
        *self == OperatorKind::Assign || self.compound_base().is_some()
    }

    /// `++`/`--` in either position.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            OperatorKind::PreIncrement
                | OperatorKind::PreDecrement
                | OperatorKind::PostIncrement
                | OperatorKind::PostDecrement
        )
    }

    /// Prefix operators that may not appear as the left operand of `**`.
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            OperatorKind::Positive
                | OperatorKind::Negate
                | OperatorKind::LogicalNot
                | OperatorKind::BitNot
                | OperatorKind::Typeof
                | OperatorKind::Void
                | OperatorKind::Delete
        )
    }
}

/// Descriptor of one operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    /// What the operator does
    pub kind: OperatorKind,
    /// Token that introduces the operator
    pub token: OperatorToken,
    /// Closing token of a two-part operator (`:` of `?:`, `)` of a call)
    pub secondary: Option<Punctuator>,
    /// Binding strength, higher binds tighter
    pub precedence: u8,
    /// Binding strength while the secondary token is still outstanding
    pub secondary_precedence: u8,
    /// Grouping direction among equal precedences
    pub associativity: Associativity,
    /// Takes an operand before the token
    pub has_left_operand: bool,
    /// Takes an operand after the token
    pub has_right_operand: bool,
    /// Takes another operand after the secondary token
    pub has_operand_after_secondary: bool,
    /// Fewest operands a complete node may have
    pub min_operands: usize,
    /// Most operands a complete node may have
    pub max_operands: usize,
}

impl Operator {
    /// Fixity this operator is read in.
    pub fn fixity(&self) -> Fixity {
        if self.has_left_operand {
            Fixity::InfixOrPostfix
        } else {
            Fixity::Prefix
        }
    }

    /// Postfix operators take no operand after the token.
    pub fn is_postfix(&self) -> bool {
        self.has_left_operand && !self.has_right_operand
    }
}

/// Most arguments a call may pass.
pub const MAX_CALL_ARGUMENTS: usize = 255;

/// The immutable operator table, keyed by token and fixity.
pub struct OperatorTable {
    entries: HashMap<(OperatorToken, Fixity), Operator>,
}

impl OperatorTable {
    fn build() -> Self {
        use Associativity::{Left, Right};
        use OperatorKind as K;
        use Punctuator as P;

        let mut table = OperatorTable {
            entries: HashMap::new(),
        };

        let binary = [
            (P::Comma, K::Comma, 1, Left),
            (P::Assign, K::Assign, 2, Right),
            (P::PlusEq, K::AddAssign, 2, Right),
            (P::MinusEq, K::SubAssign, 2, Right),
            (P::StarEq, K::MulAssign, 2, Right),
            (P::SlashEq, K::DivAssign, 2, Right),
            (P::PercentEq, K::ModAssign, 2, Right),
            (P::StarStarEq, K::ExpAssign, 2, Right),
            (P::LtLtEq, K::ShiftLeftAssign, 2, Right),
            (P::GtGtEq, K::ShiftRightAssign, 2, Right),
            (P::GtGtGtEq, K::UnsignedShiftRightAssign, 2, Right),
            (P::AndEq, K::BitAndAssign, 2, Right),
            (P::OrEq, K::BitOrAssign, 2, Right),
            (P::XorEq, K::BitXorAssign, 2, Right),
            (P::OrOr, K::LogicalOr, 4, Left),
            (P::AndAnd, K::LogicalAnd, 5, Left),
            (P::Or, K::BitOr, 6, Left),
            (P::Xor, K::BitXor, 7, Left),
            (P::And, K::BitAnd, 8, Left),
            (P::EqEq, K::Equal, 9, Left),
            (P::NotEq, K::NotEqual, 9, Left),
            (P::EqEqEq, K::StrictEqual, 9, Left),
            (P::NotEqEq, K::StrictNotEqual, 9, Left),
            (P::Lt, K::LessThan, 10, Left),
            (P::Gt, K::GreaterThan, 10, Left),
            (P::LtEq, K::LessThanOrEqual, 10, Left),
            (P::GtEq, K::GreaterThanOrEqual, 10, Left),
            (P::LtLt, K::ShiftLeft, 11, Left),
            (P::GtGt, K::ShiftRight, 11, Left),
            (P::GtGtGt, K::UnsignedShiftRight, 11, Left),
            (P::Plus, K::Add, 12, Left),
            (P::Minus, K::Subtract, 12, Left),
            (P::Star, K::Multiply, 13, Left),
            (P::Slash, K::Divide, 13, Left),
            (P::Percent, K::Modulo, 13, Left),
            (P::StarStar, K::Exponent, 14, Right),
        ];
        for (punct, kind, precedence, associativity) in binary {
            table.insert(Operator {
                kind,
                token: OperatorToken::Punct(punct),
                secondary: None,
                precedence,
                secondary_precedence: precedence,
                associativity,
                has_left_operand: true,
                has_right_operand: true,
                has_operand_after_secondary: false,
                min_operands: 2,
                max_operands: 2,
            });
        }

        for (keyword, kind) in [(Keyword::In, K::In), (Keyword::Instanceof, K::Instanceof)] {
            table.insert(Operator {
                kind,
                token: OperatorToken::Keyword(keyword),
                secondary: None,
                precedence: 10,
                secondary_precedence: 10,
                associativity: Left,
                has_left_operand: true,
                has_right_operand: true,
                has_operand_after_secondary: false,
                min_operands: 2,
                max_operands: 2,
            });
        }

        let prefix = [
            (OperatorToken::Punct(P::Plus), K::Positive),
            (OperatorToken::Punct(P::Minus), K::Negate),
            (OperatorToken::Punct(P::Not), K::LogicalNot),
            (OperatorToken::Punct(P::Tilde), K::BitNot),
            (OperatorToken::Punct(P::PlusPlus), K::PreIncrement),
            (OperatorToken::Punct(P::MinusMinus), K::PreDecrement),
            (OperatorToken::Keyword(Keyword::Typeof), K::Typeof),
            (OperatorToken::Keyword(Keyword::Void), K::Void),
            (OperatorToken::Keyword(Keyword::Delete), K::Delete),
        ];
        for (token, kind) in prefix {
            table.insert(Operator {
                kind,
                token,
                secondary: None,
                precedence: 15,
                secondary_precedence: 15,
                associativity: Right,
                has_left_operand: false,
                has_right_operand: true,
                has_operand_after_secondary: false,
                min_operands: 1,
                max_operands: 1,
            });
        }

        for (punct, kind) in [(P::PlusPlus, K::PostIncrement), (P::MinusMinus, K::PostDecrement)] {
            table.insert(Operator {
                kind,
                token: OperatorToken::Punct(punct),
                secondary: None,
                precedence: 16,
                secondary_precedence: 16,
                associativity: Left,
                has_left_operand: true,
                has_right_operand: false,
                has_operand_after_secondary: false,
                min_operands: 1,
                max_operands: 1,
            });
        }

        table.insert(Operator {
            kind: K::New,
            token: OperatorToken::Keyword(Keyword::New),
            secondary: None,
            precedence: 17,
            secondary_precedence: 17,
            associativity: Right,
            has_left_operand: false,
            has_right_operand: true,
            has_operand_after_secondary: false,
            min_operands: 1,
            max_operands: 1,
        });

        table.insert(Operator {
            kind: K::Conditional,
            token: OperatorToken::Punct(P::Question),
            secondary: Some(P::Colon),
            precedence: 2,
            secondary_precedence: 2,
            associativity: Right,
            has_left_operand: true,
            has_right_operand: true,
            has_operand_after_secondary: true,
            min_operands: 3,
            max_operands: 3,
        });

        table.insert(Operator {
            kind: K::Grouping,
            token: OperatorToken::Punct(P::LParen),
            secondary: Some(P::RParen),
            precedence: 18,
            secondary_precedence: 0,
            associativity: Left,
            has_left_operand: false,
            has_right_operand: true,
            has_operand_after_secondary: false,
            min_operands: 1,
            max_operands: 1,
        });

        table.insert(Operator {
            kind: K::FunctionCall,
            token: OperatorToken::Punct(P::LParen),
            secondary: Some(P::RParen),
            precedence: 18,
            secondary_precedence: 0,
            associativity: Left,
            has_left_operand: true,
            has_right_operand: true,
            has_operand_after_secondary: false,
            min_operands: 1,
            max_operands: 1 + MAX_CALL_ARGUMENTS,
        });

        table.insert(Operator {
            kind: K::Index,
            token: OperatorToken::Punct(P::LBracket),
            secondary: Some(P::RBracket),
            precedence: 18,
            secondary_precedence: 0,
            associativity: Left,
            has_left_operand: true,
            has_right_operand: true,
            has_operand_after_secondary: false,
            min_operands: 2,
            max_operands: 2,
        });

        table.insert(Operator {
            kind: K::MemberAccess,
            token: OperatorToken::Punct(P::Dot),
            secondary: None,
            precedence: 18,
            secondary_precedence: 18,
            associativity: Left,
            has_left_operand: true,
            has_right_operand: true,
            has_operand_after_secondary: false,
            min_operands: 2,
            max_operands: 2,
        });

        table.insert(Operator {
            kind: K::TaggedTemplate,
            token: OperatorToken::Template,
            secondary: None,
            precedence: 18,
            secondary_precedence: 18,
            associativity: Left,
            has_left_operand: true,
            has_right_operand: true,
            has_operand_after_secondary: false,
            min_operands: 2,
            max_operands: 2,
        });

        table
    }

    fn insert(&mut self, operator: Operator) {
        self.entries
            .insert((operator.token, operator.fixity()), operator);
    }

    /// Finds the operator introduced by `token` in the given position.
    pub fn lookup(&self, token: OperatorToken, fixity: Fixity) -> Option<&Operator> {
        self.entries.get(&(token, fixity))
    }

    /// Finds an operator by its kind.
    pub fn by_kind(&self, kind: OperatorKind) -> Option<&Operator> {
        self.entries.values().find(|op| op.kind == kind)
    }

    /// Number of operators in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every operator.
    pub fn iter(&self) -> impl Iterator<Item = &Operator> {
        self.entries.values()
    }
}

static OPERATOR_TABLE: Lazy<OperatorTable> = Lazy::new(OperatorTable::build);

/// The process-wide operator table.
pub fn operator_table() -> &'static OperatorTable {
    &OPERATOR_TABLE
}

/// Shorthand for looking up an operator in the shared table.
pub fn lookup(token: OperatorToken, fixity: Fixity) -> Option<&'static Operator> {
    OPERATOR_TABLE.lookup(token, fixity)
}
