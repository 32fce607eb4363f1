use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

use crate::{Position, Span};

/// Declares the closed diagnostic catalogue.
///
/// Each kind carries a template whose `%0`, `%1`, ... placeholders are
/// substituted with the positional arguments of an [`Error`].
macro_rules! define_error_kinds {
    ($($phase:ident { $($name:ident => $template:literal),* $(,)? })*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorKind {
            $($($name,)*)*
        }

        impl ErrorKind {
            pub const ALL: &'static [ErrorKind] = &[$($(ErrorKind::$name,)*)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $($(ErrorKind::$name => stringify!($name),)*)*
                }
            }

            pub fn template(&self) -> &'static str {
                match self {
                    $($(ErrorKind::$name => $template,)*)*
                }
            }

            pub fn phase(&self) -> Phase {
                match self {
                    $($(ErrorKind::$name => Phase::$phase,)*)*
                }
            }
        }
    };
}

/// Which stage of the pipeline a diagnostic kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexical,
    Syntactic,
    Semantic,
}

define_error_kinds! {
    Lexical {
        UnrecognisedToken => "unrecognised token `%0`",
        BadEscapeSequence => "invalid escape sequence `\\%0`",
        MalformedCharLiteral => "malformed character literal `%0`",
        NumberParseError => "invalid number `%0`, is it above the integer limit?",
    }
    Syntactic {
        ExpectedToken => "expected %0, found `%1`",
        ExpectedIdentifier => "expected identifier %0, found `%1`",
        ExpectedType => "expected type, found `%0`",
        ExpectedStatement => "expected statement, found `%0`",
        ExpectedExpression => "expected expression, found `%0`",
    }
    Semantic {
        UndeclaredVariable => "variable `%0` is not declared",
        UndeclaredFunction => "function `%0` is not declared",
        UndeclaredStruct => "struct `%0` is not declared",
        UndeclaredTrait => "trait `%0` is not declared",
        UndeclaredField => "struct `%0` has no field `%1`",
        UndeclaredMethod => "`%0` has no method `%1`",
        UndeclaredModule => "module `%0` is not declared",
        UnknownType => "unknown type `%0`",
        Redefinition => "%0 `%1` is already declared",
        TypeMismatch => "expected type `%0`, found `%1`",
        ExpectedNumeric => "operator `%0` expects numeric operands, found `%1` and `%2`",
        ExpectedBoolean => "operator `%0` expects boolean operands, found `%1` and `%2`",
        ExpectedInteger => "operator `%0` expects integer operands, found `%1` and `%2`",
        IncompatibleOperands => "operator `%0` cannot compare `%1` with `%2`",
        CastNotAllowed => "cannot cast from `%0` to `%1`",
        WrongArgumentCount => "`%0` expects %1 arguments, received %2",
        AssignToConst => "cannot assign to constant `%0`",
        NotAssignable => "expression cannot be assigned to",
        FieldAlreadyInitialized => "field `%0` is already initialized",
        AccessViolation => "%0 `%1` is private to module `%2`",
        CannotBeHere => "`%0` cannot be here",
        NotAllPathsReturn => "not all paths of `%0` return a value",
        CannotReturnValue => "function `%0` returns nothing and cannot return a value",
        ExpectedReturnValue => "function `%0` must return a value of type `%1`",
        ExpectedExplicitValue => "expected explicit value when no type is given for `%0`",
        TraitMethodNotImplemented => "struct `%0` does not implement `%1` required by trait `%2`",
        TraitSignatureMismatch => "method `%0.%1` does not match the signature declared by trait `%2`",
        TraitNotImplemented => "struct `%0` does not implement trait `%1`",
        ImportCycle => "importing `%0` from `%1` creates an import cycle",
        RecursiveStruct => "struct `%0` contains itself through field `%1`",
        NotConstantExpression => "initializer of `%0` is not a constant expression",
    }
}

/// A diagnostic: a kind from the closed catalogue, where it happened and the
/// positional arguments for the kind's template.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    span: Span,
    args: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span, args: Vec<String>) -> Self {
        Error { kind, span, args }
    }

    /// Creates an error that only knows its start position.
    pub fn at(kind: ErrorKind, position: Position, args: Vec<String>) -> Self {
        Error {
            kind,
            span: Span {
                start: position.clone(),
                end: position,
            },
            args,
        }
    }

    pub fn get_kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn get_span(&self) -> &Span {
        &self.span
    }

    pub fn get_position(&self) -> &Position {
        &self.span.start
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_error_name(&self) -> &str {
        self.kind.name()
    }

    /// Substitutes `%N` placeholders in the kind's template.
    ///
    /// Placeholders without a matching argument are left as written.
    pub fn message(&self) -> String {
        let template = self.kind.template();
        let mut result = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                result.push(ch);
                continue;
            }

            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|c| c.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }

            match digits.parse::<usize>().ok().and_then(|i| self.args.get(i)) {
                Some(arg) => result.push_str(arg),
                None => {
                    result.push('%');
                    result.push_str(&digits);
                }
            }
        }

        result
    }

    pub fn get_tip(&self) -> ErrorTip {
        let message = self.message();
        if message.is_empty() {
            ErrorTip::None
        } else {
            ErrorTip::Suggestion(message)
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message())
    }
}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

/// Collects diagnostics so analysis can keep going after an error.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: ErrorKind, span: &Span, args: Vec<String>) {
        self.push(Error::new(kind, span.clone(), args));
    }

    pub fn push(&mut self, error: Error) {
        tracing::debug!(kind = error.get_error_name(), message = %error.message(), offset = error.get_position().0, "diagnostic");
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn has(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.get_kind() == kind)
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.get_kind() == kind).count()
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

/// Failures raised while lowering a checked program.
///
/// Analysis already rejected ill-typed programs, so these signal an
/// inconsistency between the symbol model and the lowering, never a user
/// mistake.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("struct `{0}` could not be resolved during lowering")]
    UnresolvedStruct(String),
    #[error("trait `{0}` could not be resolved during lowering")]
    UnresolvedTrait(String),
    #[error("function `{0}` could not be resolved during lowering")]
    UnresolvedFunction(String),
    #[error("variable `{0}` could not be resolved during lowering")]
    UnresolvedVariable(String),
    #[error("`{0}` has no method `{1}` during lowering")]
    UnresolvedMethod(String, String),
    #[error("`{0}` has no field `{1}` during lowering")]
    UnresolvedField(String, String),
    #[error("static struct identity of expression could not be recovered")]
    UnknownIdentity,
    #[error("type `{0}` has no lowered representation")]
    UnsupportedType(String),
    #[error("call returning nothing used as a value")]
    VoidValue,
    #[error("expression is not addressable")]
    NotAddressable,
    #[error("`{0}` outside of a loop during lowering")]
    OutsideLoop(String),
    #[error("no entry unit to lower")]
    NoEntry,
    #[error("IR builder failed: {0}")]
    Builder(String),
    #[error("module failed verification: {0}")]
    Verify(String),
}

impl From<inkwell::builder::BuilderError> for CodegenError {
    fn from(error: inkwell::builder::BuilderError) -> Self {
        CodegenError::Builder(format!("{:?}", error))
    }
}

/// Pipeline-level failure returned by the driver.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("lexing failed: {0}")]
    Lex(Error),
    #[error("parsing failed: {0}")]
    Parse(Error),
    #[error("semantic analysis reported {} error(s)", .0.len())]
    Semantic(Vec<Error>),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("backend failed: {0}")]
    Backend(String),
}
