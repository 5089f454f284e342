use num::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::ast::{
    BinaryOperator, Constant, Expression, GenericAssociation, StaticAssert, TypeName,
    UnaryOperator,
};
use crate::cmdline::LangOptions;
use crate::literal::{self, IntegerBase, IntegerSize};
use crate::machine::Machine;
use crate::name_scope::NameScope;
use crate::span::{Node, Span};
use crate::string::{self, CharPrefix};
use crate::{
    ctype::{self, CType, QualifiedType},
    error::{CompileError, CompileWarning, ErrorCollector},
    type_builder::TypeBuilder,
    value::{TypedValue, Value},
};

/**
 * Everything a constant expression may depend on.
 *
 * Without a scope the expression is a preprocessor `#if` condition: every value is taken
 * as `intmax_t` or `uintmax_t`, and types cannot be named.
 */
pub struct Env<'a> {
    pub machine: &'a Machine,
    pub lang: &'a LangOptions,
    pub scope: Option<&'a mut NameScope>,
    unevaluated: u32,
}

impl<'a> Env<'a> {
    pub fn new(machine: &'a Machine, lang: &'a LangOptions, scope: &'a mut NameScope) -> Self {
        Self {
            machine,
            lang,
            scope: Some(scope),
            unevaluated: 0,
        }
    }

    pub fn new_preprocessor(machine: &'a Machine, lang: &'a LangOptions) -> Self {
        Self {
            machine,
            lang,
            scope: None,
            unevaluated: 0,
        }
    }

    pub fn is_preprocessor(&self) -> bool {
        self.scope.is_none()
    }

    /**
     * Operands that are only typed, never evaluated: the branch of `?:` not taken, the
     * right side of a short-circuited `&&`/`||`, operands of `sizeof` and `_Generic`.
     */
    pub fn is_unevaluated(&self) -> bool {
        self.unevaluated > 0
    }

    fn unevaluated<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        self.unevaluated += 1;
        let r = f(self);
        self.unevaluated -= 1;
        r
    }

    /**
     * Report a diagnostic about the result of an evaluation. Unevaluated operands stay quiet.
     */
    fn warn(&self, warning: CompileWarning, span: Span, ec: &mut ErrorCollector) -> Result<(), ()> {
        if self.is_unevaluated() {
            Ok(())
        } else {
            ec.record_warning(warning, span)
        }
    }

    fn forbid_in_preprocessor(&self, what: &str, span: Span, ec: &mut ErrorCollector) -> Result<(), ()> {
        if self.is_preprocessor() {
            ec.record_error(CompileError::ForbiddenInPreprocessor(what.to_string()), span)?;
        }
        Ok(())
    }
}

pub fn compute_constant_expr(
    expr: Node<Expression>,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let span = expr.span;
    let v = match expr.node {
        Expression::Identifier(id) => process_identifier(&id, span, env, ec)?,
        Expression::Constant(c) => process_constant(c, span, env, ec)?,
        Expression::StringLiteral(pieces) => {
            env.forbid_in_preprocessor("string literal", span, ec)?;
            if !env.is_unevaluated() {
                ec.record_error(CompileError::NonConstInConstExpr, span)?;
                unreachable!()
            }
            let (element, len) = string_literal_array(&pieces, span, env.machine, env.lang, ec)?;
            TypedValue {
                t: QualifiedType::new(CType::Array(
                    Box::new(QualifiedType::new(element)),
                    Some(len),
                )),
                val: Value::Void,
            }
        }
        Expression::Cast(type_name, operand) => {
            env.forbid_in_preprocessor("cast", span, ec)?;
            process_cast_expression_node(*type_name, *operand, span, env, ec)?
        }
        Expression::UnaryOperator(op, operand) => {
            process_unary_operator_expression_node(op, *operand, env, ec)?
        }
        Expression::BinaryOperator(op, lhs, rhs) => {
            process_binary_operator_expression_node(op, *lhs, *rhs, span, env, ec)?
        }
        Expression::Conditional(cond, then_expr, else_expr) => {
            process_condition_expression_node(*cond, *then_expr, *else_expr, env, ec)?
        }
        Expression::SizeOfTy(type_name) => {
            env.forbid_in_preprocessor("sizeof", span, ec)?;
            let t = build_type_name(*type_name, env, ec)?;
            let size = t.t.sizeof(env.machine, span, ec)?;
            TypedValue::new_integer(BigInt::from(size), ctype::size_type(env.machine), env.machine)
        }
        Expression::SizeOfVal(operand) => {
            env.forbid_in_preprocessor("sizeof", span, ec)?;
            let v = env.unevaluated(|env| compute_constant_expr(*operand, env, ec))?;
            let size = v.t.t.sizeof(env.machine, span, ec)?;
            TypedValue::new_integer(BigInt::from(size), ctype::size_type(env.machine), env.machine)
        }
        Expression::AlignOf(type_name) => {
            env.forbid_in_preprocessor("_Alignof", span, ec)?;
            let t = build_type_name(*type_name, env, ec)?;
            let align = t.t.alignof(env.machine, span, ec)?;
            TypedValue::new_integer(BigInt::from(align), ctype::size_type(env.machine), env.machine)
        }
        Expression::GenericSelection(controlling, associations) => {
            env.forbid_in_preprocessor("_Generic", span, ec)?;
            process_generic_selection(*controlling, associations, span, env, ec)?
        }
        Expression::Call(_, _) => {
            ec.record_error(CompileError::CallsForbidden, span)?;
            unreachable!()
        }
        Expression::Member(_, _) => {
            ec.record_error(CompileError::NonConstInConstExpr, span)?;
            unreachable!()
        }
        Expression::Comma(v) => {
            let mut last = None;
            for node in v {
                last = Some(compute_constant_expr(node, env, ec)?);
            }
            match last {
                Some(v) => v,
                None => unreachable!(), // the parser never builds an empty comma list
            }
        }
    };
    if env.is_preprocessor() && v.t.t.is_integer() {
        let t = ctype::intmax_type(env.machine, v.t.t.is_signed());
        return Ok(v.cast_to(&t, env.machine));
    }
    Ok(v)
}

/**
 * Evaluate the condition of a static assertion and fail it when the value is zero.
 */
pub fn check_static_assert(
    sa: Node<StaticAssert>,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<(), ()> {
    let StaticAssert {
        expression,
        message,
        text,
    } = sa.node;
    let expr_span = expression.span;
    let val = compute_constant_expr(*expression, env, ec)?;
    if !val.t.t.is_integer() {
        ec.record_error(CompileError::IntegerTypeRequired, expr_span)?;
        unreachable!()
    }
    tracing::debug!(expression = %text, value = %val.unwrap_integer(), "static assertion");
    if val.is_zero() {
        ec.record_error(
            CompileError::StaticAssertionFailed {
                expression: text,
                message: message.map(|m| m.node),
            },
            sa.span,
        )?;
    }
    Ok(())
}

fn build_type_name(
    type_name: Node<TypeName>,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<QualifiedType, ()> {
    TypeBuilder::build_type_name(type_name, env, ec)
}

fn process_identifier(
    id: &str,
    span: Span,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let unevaluated = env.is_unevaluated();
    match env.scope.as_deref() {
        Some(scope) => scope.get_constant(id, unevaluated, span, ec),
        None => {
            // the preprocessor replaces all identifiers before evaluation
            ec.record_error(CompileError::UnknownIdentifier(id.to_string()), span)?;
            unreachable!()
        }
    }
}

fn process_constant(
    c: Constant,
    span: Span,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let m = env.machine;
    match c {
        Constant::Integer(text) => {
            let lit = match literal::parse_integer_literal(&text, env.lang.is_c23()) {
                Ok(lit) => lit,
                Err(e) => {
                    ec.record_error(CompileError::LiteralError(e), span)?;
                    unreachable!()
                }
            };
            if !env.lang.is_c23() {
                if lit.base == IntegerBase::Binary {
                    ec.record_warning(
                        CompileWarning::C23Extension("binary integer literal".to_string()),
                        span,
                    )?;
                }
                if lit.suffix.size == IntegerSize::BitPrecise {
                    ec.record_warning(
                        CompileWarning::C23Extension("'_BitInt' suffix for literals".to_string()),
                        span,
                    )?;
                }
            }
            if env.is_preprocessor() {
                // #if arithmetic is done in intmax_t/uintmax_t
                let value = BigInt::from(lit.value.clone());
                let signed = ctype::intmax_type(m, true);
                let unsigned = ctype::intmax_type(m, false);
                let t = if !lit.suffix.unsigned && signed.fits(&value, m) {
                    signed
                } else if unsigned.fits(&value, m) {
                    if !lit.suffix.unsigned && lit.is_decimal() {
                        ec.record_warning(CompileWarning::ImplicitlyUnsignedLiteral, span)?;
                    }
                    unsigned
                } else {
                    ec.record_error(CompileError::LiteralTooLarge, span)?;
                    unreachable!()
                };
                return Ok(TypedValue::new_integer(value, t, m));
            }
            match TypedValue::new_from_int_literal(&lit, m) {
                Ok((v, warning)) => {
                    if let Some(w) = warning {
                        ec.record_warning(w, span)?;
                    }
                    Ok(v)
                }
                Err(e) => {
                    ec.record_error(e, span)?;
                    unreachable!()
                }
            }
        }
        Constant::Character(text) => match string::parse_char_literal(&text) {
            Ok(lit) => {
                let (v, warning) = TypedValue::new_from_char_literal(&lit, m);
                if let Some(w) = warning {
                    ec.record_warning(w, span)?;
                }
                Ok(v)
            }
            Err(e) => {
                ec.record_error(CompileError::CharParseError(e), span)?;
                unreachable!()
            }
        },
        Constant::Bool(b) => Ok(TypedValue::new_integer(
            BigInt::from(b as u8),
            CType::Bool,
            m,
        )),
    }
}

/**
 * Element type and length, terminating zero included, of the array a string literal made
 * of adjacent `pieces` designates. A piece with an encoding prefix sets it for all of them.
 */
pub fn string_literal_array(
    pieces: &[String],
    span: Span,
    m: &Machine,
    lang: &LangOptions,
    ec: &mut ErrorCollector,
) -> Result<(CType, u64), ()> {
    let mut prefix = CharPrefix::None;
    for piece in pieces {
        match string::string_prefix(piece) {
            Ok(CharPrefix::None) => (),
            Ok(p) => {
                prefix = p;
                break;
            }
            Err(e) => {
                ec.record_error(CompileError::CharParseError(e), span)?;
                unreachable!()
            }
        }
    }
    let wide16 = m.size_of(m.wchar_type().0) == 2;
    let mut len = 1;
    for piece in pieces {
        match string::encode_string_literal(piece, prefix, wide16) {
            Ok(units) => len += units.len() as u64,
            Err(e) => {
                ec.record_error(CompileError::CharParseError(e), span)?;
                unreachable!()
            }
        }
    }
    let element = match prefix {
        CharPrefix::None => ctype::char_type(m),
        CharPrefix::Utf8 if lang.is_c23() => ctype::UCHAR_TYPE,
        CharPrefix::Utf8 => ctype::char_type(m),
        CharPrefix::Char16 => ctype::char16_type(m),
        CharPrefix::Char32 => ctype::char32_type(m),
        CharPrefix::Wide => ctype::wchar_type(m),
    };
    Ok((element, len))
}

/**
 * Store an exact result into `t`, warning when a signed result does not fit.
 */
fn wrap_result(
    value: BigInt,
    t: CType,
    span: Span,
    env: &Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let m = env.machine;
    if t.is_signed() && !t.fits(&value, m) {
        let wrapped = t.wrap(&value, m);
        env.warn(
            CompileWarning::IntegerOverflow(wrapped.to_string(), t.to_string()),
            span,
            ec,
        )?;
    }
    Ok(TypedValue::new_integer(value, t, m))
}

fn process_condition_expression_node(
    cond: Node<Expression>,
    then_expr: Node<Expression>,
    else_expr: Node<Expression>,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let cond_span = cond.span;
    let else_span = else_expr.span;
    let cond_val = compute_constant_expr(cond, env, ec)?;
    if !cond_val.t.t.is_scalar() {
        ec.record_error(CompileError::ScalarTypeRequired, cond_span)?;
        unreachable!()
    }
    let take_then = !cond_val.is_zero();
    let (then_val, else_val) = if take_then {
        let then_val = compute_constant_expr(then_expr, env, ec)?;
        let else_val = env.unevaluated(|env| compute_constant_expr(else_expr, env, ec))?;
        (then_val, else_val)
    } else {
        let then_val = env.unevaluated(|env| compute_constant_expr(then_expr, env, ec))?;
        let else_val = compute_constant_expr(else_expr, env, ec)?;
        (then_val, else_val)
    };
    let chosen = if then_val.t.t.is_arithmetic() && else_val.t.t.is_arithmetic() {
        let (then_val, else_val) =
            TypedValue::usual_arithmetic_convert(then_val, else_val, env.machine);
        if take_then {
            then_val
        } else {
            else_val
        }
    } else if (then_val.t.t.is_void() && else_val.t.t.is_void())
        || then_val.t.is_compatible_to(&else_val.t, false)
    {
        if take_then {
            then_val
        } else {
            else_val
        }
    } else {
        ec.record_error(
            CompileError::IncompatibleTypes(then_val.t, else_val.t),
            else_span,
        )?;
        unreachable!()
    };
    Ok(chosen)
}

fn process_binary_operator_expression_node(
    op: Node<BinaryOperator>,
    lhs: Node<Expression>,
    rhs: Node<Expression>,
    span: Span,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let lhs_span = lhs.span;
    let rhs_span = rhs.span;
    let op_span = op.span;
    let op = op.node;

    match op {
        BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
            return logical_op(op, lhs, rhs, env, ec);
        }
        BinaryOperator::Assign
        | BinaryOperator::AssignMultiply
        | BinaryOperator::AssignDivide
        | BinaryOperator::AssignModulo
        | BinaryOperator::AssignPlus
        | BinaryOperator::AssignMinus
        | BinaryOperator::AssignShiftLeft
        | BinaryOperator::AssignShiftRight
        | BinaryOperator::AssignBitwiseAnd
        | BinaryOperator::AssignBitwiseXor
        | BinaryOperator::AssignBitwiseOr => {
            ec.record_error(CompileError::AssignmentToConst, op_span)?;
            unreachable!()
        }
        BinaryOperator::Index => {
            ec.record_error(CompileError::NonConstInConstExpr, span)?;
            unreachable!()
        }
        _ => (),
    }

    let lhs = compute_constant_expr(lhs, env, ec)?;
    let rhs = compute_constant_expr(rhs, env, ec)?;
    let m = env.machine;
    match op {
        BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Multiply => {
            if !lhs.t.t.is_arithmetic() || !rhs.t.t.is_arithmetic() {
                ec.record_error(CompileError::BadTypesForOperator(op.to_string()), op_span)?;
                unreachable!()
            }
            let (lhs, rhs) = TypedValue::usual_arithmetic_convert(lhs, rhs, m);
            let lhs_val = lhs.unwrap_integer();
            let rhs_val = rhs.unwrap_integer();
            let r = match op {
                BinaryOperator::Plus => lhs_val + rhs_val,
                BinaryOperator::Minus => lhs_val - rhs_val,
                _ => lhs_val * rhs_val,
            };
            wrap_result(r, lhs.t.t, span, env, ec)
        }
        BinaryOperator::Divide | BinaryOperator::Modulo => {
            if !lhs.t.t.is_arithmetic() || !rhs.t.t.is_arithmetic() {
                let span = if !lhs.t.t.is_arithmetic() {
                    lhs_span
                } else {
                    rhs_span
                };
                ec.record_error(CompileError::ArithmeticTypeRequired, span)?;
                unreachable!()
            }
            let (lhs, rhs) = TypedValue::usual_arithmetic_convert(lhs, rhs, m);
            if rhs.is_zero() {
                if env.is_unevaluated() {
                    return Ok(TypedValue::new_integer(BigInt::zero(), lhs.t.t, m));
                }
                ec.record_error(CompileError::DivisionByZero, rhs_span)?;
                unreachable!()
            }
            // BigInt division truncates toward zero, as C does
            let r = if op == BinaryOperator::Divide {
                lhs.unwrap_integer() / rhs.unwrap_integer()
            } else {
                lhs.unwrap_integer() % rhs.unwrap_integer()
            };
            wrap_result(r, lhs.t.t, span, env, ec)
        }
        BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => {
            shift_op(op, lhs, rhs, lhs_span, rhs_span, span, env, ec)
        }
        BinaryOperator::Less
        | BinaryOperator::Greater
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterOrEqual
        | BinaryOperator::Equals
        | BinaryOperator::NotEquals => {
            let r = compare(lhs, rhs, span, env, ec)?;
            let holds = match op {
                BinaryOperator::Less => r < 0,
                BinaryOperator::Greater => r > 0,
                BinaryOperator::LessOrEqual => r <= 0,
                BinaryOperator::GreaterOrEqual => r >= 0,
                BinaryOperator::Equals => r == 0,
                _ => r != 0,
            };
            Ok(TypedValue::new_integer(
                BigInt::from(holds as u8),
                ctype::INT_TYPE,
                m,
            ))
        }
        BinaryOperator::BitwiseAnd => integer_op(|a, b| a & b, lhs, rhs, lhs_span, rhs_span, env, ec),
        BinaryOperator::BitwiseXor => integer_op(|a, b| a ^ b, lhs, rhs, lhs_span, rhs_span, env, ec),
        BinaryOperator::BitwiseOr => integer_op(|a, b| a | b, lhs, rhs, lhs_span, rhs_span, env, ec),
        _ => unreachable!(), // handled before evaluating the operands
    }
}

/**
 * Common method for relation operators.
 *
 * Returns -1, 0, 1
 */
fn compare(
    lhs: TypedValue,
    rhs: TypedValue,
    span: Span,
    env: &Env,
    ec: &mut ErrorCollector,
) -> Result<isize, ()> {
    if lhs.t.t.is_arithmetic() && rhs.t.t.is_arithmetic() {
        let (lhs, rhs) = TypedValue::usual_arithmetic_convert(lhs, rhs, env.machine);
        let lhs = lhs.unwrap_integer();
        let rhs = rhs.unwrap_integer();
        Ok(if lhs < rhs {
            -1
        } else if lhs == rhs {
            0
        } else {
            1
        })
    } else {
        ec.record_error(CompileError::CannotCompare(lhs.t, rhs.t), span)?;
        unreachable!()
    }
}

/**
 * Common method for bitwise operations.
 */
fn integer_op<F>(
    f: F,
    lhs: TypedValue,
    rhs: TypedValue,
    lhs_span: Span,
    rhs_span: Span,
    env: &Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()>
where
    F: FnOnce(&BigInt, &BigInt) -> BigInt,
{
    if lhs.t.t.is_integer() && rhs.t.t.is_integer() {
        let (lhs, rhs) = TypedValue::usual_arithmetic_convert(lhs, rhs, env.machine);
        let r = f(lhs.unwrap_integer(), rhs.unwrap_integer());
        Ok(TypedValue::new_integer(r, lhs.t.t, env.machine))
    } else {
        let span = if !lhs.t.t.is_integer() {
            lhs_span
        } else {
            rhs_span
        };
        ec.record_error(CompileError::IntegerTypeRequired, span)?;
        unreachable!()
    }
}

/**
 * Shifts keep the type of the promoted left operand. The count must be below its width.
 */
#[allow(clippy::too_many_arguments)]
fn shift_op(
    op: BinaryOperator,
    lhs: TypedValue,
    rhs: TypedValue,
    lhs_span: Span,
    rhs_span: Span,
    span: Span,
    env: &Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let m = env.machine;
    if !lhs.t.t.is_integer() || !rhs.t.t.is_integer() {
        let span = if !lhs.t.t.is_integer() {
            lhs_span
        } else {
            rhs_span
        };
        ec.record_error(CompileError::IntegerTypeRequired, span)?;
        unreachable!()
    }
    let lhs = lhs.promote(m);
    let rhs = rhs.promote(m);
    let width = lhs.t.t.width(m).unwrap_or(0);
    let count = rhs
        .unwrap_integer()
        .to_usize()
        .filter(|c| *c < width as usize);
    let count = match count {
        Some(c) => c,
        None => {
            if env.is_unevaluated() {
                return Ok(TypedValue::new_integer(BigInt::zero(), lhs.t.t, m));
            }
            ec.record_error(CompileError::ShiftOutOfRange(lhs.t.t.to_string()), rhs_span)?;
            unreachable!()
        }
    };
    let value = lhs.unwrap_integer();
    let r = if op == BinaryOperator::ShiftLeft {
        value << count
    } else {
        // arithmetic shift: BigInt rounds toward negative infinity
        value >> count
    };
    wrap_result(r, lhs.t.t, span, env, ec)
}

/**
 * `&&` and `||`. The right operand is only typed when the left one decides the result.
 */
fn logical_op(
    op: BinaryOperator,
    lhs: Node<Expression>,
    rhs: Node<Expression>,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let lhs_span = lhs.span;
    let rhs_span = rhs.span;
    let lhs = compute_constant_expr(lhs, env, ec)?;
    if !lhs.t.t.is_scalar() {
        ec.record_error(CompileError::ScalarTypeRequired, lhs_span)?;
        unreachable!()
    }
    let lhs_true = !lhs.is_zero();
    let short_circuit = match op {
        BinaryOperator::LogicalAnd => !lhs_true,
        _ => lhs_true,
    };
    let rhs = if short_circuit {
        env.unevaluated(|env| compute_constant_expr(rhs, env, ec))?
    } else {
        compute_constant_expr(rhs, env, ec)?
    };
    if !rhs.t.t.is_scalar() {
        ec.record_error(CompileError::ScalarTypeRequired, rhs_span)?;
        unreachable!()
    }
    let r = if short_circuit {
        lhs_true
    } else {
        !rhs.is_zero()
    };
    Ok(TypedValue::new_integer(
        BigInt::from(r as u8),
        ctype::INT_TYPE,
        env.machine,
    ))
}

fn process_unary_operator_expression_node(
    op: Node<UnaryOperator>,
    operand: Node<Expression>,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let span = op.span;
    match op.node {
        UnaryOperator::PostIncrement
        | UnaryOperator::PostDecrement
        | UnaryOperator::PreIncrement
        | UnaryOperator::PreDecrement => {
            ec.record_error(CompileError::AssignmentToConst, span)?;
            unreachable!()
        }
        UnaryOperator::Address | UnaryOperator::Indirection => {
            ec.record_error(CompileError::NonConstInConstExpr, span)?;
            unreachable!()
        }
        _ => (),
    }
    let full_span = span.join(operand.span);
    let val = compute_constant_expr(operand, env, ec)?;
    let m = env.machine;
    match op.node {
        UnaryOperator::Plus => {
            if !val.t.t.is_arithmetic() {
                ec.record_error(CompileError::ArithmeticTypeRequired, span)?;
                unreachable!()
            }
            Ok(val.promote(m))
        }
        UnaryOperator::Minus => {
            if !val.t.t.is_arithmetic() {
                ec.record_error(CompileError::ArithmeticTypeRequired, span)?;
                unreachable!()
            }
            let val = val.promote(m);
            let negated = -val.unwrap_integer();
            wrap_result(negated, val.t.t, full_span, env, ec)
        }
        UnaryOperator::Complement => {
            if !val.t.t.is_integer() {
                ec.record_error(CompileError::IntegerTypeRequired, span)?;
                unreachable!()
            }
            Ok(val.promote(m).complement(m))
        }
        UnaryOperator::Negate => {
            if !val.t.t.is_scalar() {
                ec.record_error(CompileError::ScalarTypeRequired, span)?;
                unreachable!()
            }
            Ok(val.boolean_not(m))
        }
        _ => unreachable!(),
    }
}

fn process_cast_expression_node(
    type_name: Node<TypeName>,
    operand: Node<Expression>,
    span: Span,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let new_type = build_type_name(type_name, env, ec)?;
    let value = compute_constant_expr(operand, env, ec)?;
    cast(value, &new_type, span, env.machine, ec)
}

/**
 * Explicit conversion of a constant. The result keeps the qualifiers of `new_type`.
 */
pub fn cast(
    constant: TypedValue,
    new_type: &QualifiedType,
    span: Span,
    m: &Machine,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    if !constant.t.t.is_explicit_castable_to(&new_type.t) {
        ec.record_error(
            CompileError::BadCast(constant.t.to_string(), new_type.to_string()),
            span,
        )?;
        unreachable!()
    }
    if let CType::Array(_, _) = constant.t.t {
        ec.record_error(CompileError::NonConstInConstExpr, span)?;
        unreachable!()
    }
    let val = match (&new_type.t, constant.val) {
        (CType::Void, _) => Value::Void,
        (t, Value::Int(x)) => Value::Int(t.wrap(&x, m)),
        (_, Value::Void) => {
            ec.record_error(
                CompileError::BadCast(constant.t.to_string(), new_type.to_string()),
                span,
            )?;
            unreachable!()
        }
    };
    Ok(TypedValue {
        t: new_type.clone(),
        val,
    })
}

fn process_generic_selection(
    controlling: Node<Expression>,
    associations: Vec<Node<GenericAssociation>>,
    span: Span,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let controlling = env.unevaluated(|env| compute_constant_expr(controlling, env, ec))?;
    // lvalue conversion drops qualifiers; arrays decay to pointers
    let mut controlling_type = controlling.t.unqualified();
    if let CType::Array(element, _) = controlling_type.t {
        controlling_type = QualifiedType::new(CType::Pointer(element));
    }

    let mut seen: Vec<QualifiedType> = Vec::new();
    let mut default = None;
    let mut selected = None;
    for assoc in associations {
        let assoc_span = assoc.span;
        match assoc.node {
            GenericAssociation::Type(type_name, expr) => {
                let t = build_type_name(type_name, env, ec)?;
                if seen.iter().any(|s| s.is_compatible_to(&t, true)) {
                    ec.record_error(CompileError::GenericDuplicate(t.to_string()), assoc_span)?;
                    unreachable!()
                }
                if selected.is_none() && t.is_compatible_to(&controlling_type, true) {
                    selected = Some(*expr);
                }
                seen.push(t);
            }
            GenericAssociation::Default(expr) => {
                if default.is_some() {
                    ec.record_error(
                        CompileError::GenericDuplicate("default".to_string()),
                        assoc_span,
                    )?;
                    unreachable!()
                }
                default = Some(*expr);
            }
        }
    }
    match selected.or(default) {
        Some(expr) => compute_constant_expr(expr, env, ec),
        None => {
            ec.record_error(
                CompileError::GenericNoMatch(controlling_type.to_string()),
                span,
            )?;
            unreachable!()
        }
    }
}
