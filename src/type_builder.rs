use num::BigInt;
use num_traits::{One, ToPrimitive};
use std::fmt::Formatter;

use crate::ast::{
    DeclarationSpecifier, DerivedDeclarator, EnumType, TypeName, TypeQualifier, TypeSpecifier,
};
use crate::constant::{self, Env};
use crate::ctype::{self, CType, IntKind, QualifiedType, Qualifiers};
use crate::error::{CompileError, CompileWarning, ErrorCollector};
use crate::machine;
use crate::span::{Node, Span};
use crate::value::TypedValue;

/**
 * Starts building a type from one or more declaration specifiers.
 */
pub struct TypeBuilder {
    base_type: Option<BaseType>,
    modifier: TypeModifier,
    sign: SignModifier,
    qualifiers: Qualifiers,
}

/**
 * Continues building a type. Cloned for every declarator of a declaration.
 */
#[derive(Clone)]
pub struct TypeBuilderStage2 {
    base_type: QualifiedType,
}

enum BaseType {
    Void,
    Int,
    Char,
    Bool,
    Int128,
    BitInt(BigInt),
    Enum(String, CType),
    Alias(String, QualifiedType),
}

enum TypeModifier {
    None,
    Short,
    Long,
    LongLong,
}

enum SignModifier {
    Default,
    Signed,
    Unsigned,
}

impl TypeBuilder {
    pub fn new() -> Self {
        Self {
            base_type: None,
            modifier: TypeModifier::None,
            sign: SignModifier::Default,
            qualifiers: Qualifiers::empty(),
        }
    }

    /**
     * Build the type of a type name, as used in casts, `sizeof` and `_Generic`.
     */
    pub fn build_type_name(
        type_name: Node<TypeName>,
        env: &mut Env,
        ec: &mut ErrorCollector,
    ) -> Result<QualifiedType, ()> {
        let span = type_name.span;
        let TypeName {
            specifiers,
            declarator,
        } = type_name.node;
        let mut builder = TypeBuilder::new();
        for spec in specifiers {
            match spec.node {
                DeclarationSpecifier::TypeSpecifier(ts) => {
                    builder.add_type_specifier_node(ts, env, ec)?
                }
                DeclarationSpecifier::TypeQualifier(tq) => {
                    builder.add_type_qualifier_node(tq, ec)?
                }
                DeclarationSpecifier::StorageClass(sc) => {
                    ec.record_error(
                        CompileError::WrongStorageClass(sc.node.to_string()),
                        sc.span,
                    )?;
                    unreachable!()
                }
                DeclarationSpecifier::Function(_) => {
                    ec.record_error(
                        CompileError::WrongModifiers("a type name".to_string()),
                        spec.span,
                    )?;
                    unreachable!()
                }
            }
        }
        let mut stage2 = builder.stage2(span, env, ec)?;
        if let Some(declarator) = declarator {
            for dd in declarator.node.derived {
                stage2.add_derived_declarator_node(dd, env, ec)?;
            }
        }
        Ok(stage2.finalize())
    }

    pub fn add_type_qualifier_node(
        &mut self,
        qual: Node<TypeQualifier>,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        let q = convert_qualifier(qual.node);
        if self.qualifiers.contains(q) {
            ec.record_warning(CompileWarning::DuplicateQualifier(q.to_string().trim().to_string()), qual.span)?;
        }
        self.qualifiers |= q;
        Ok(())
    }

    pub fn add_type_specifier_node(
        &mut self,
        spec: Node<TypeSpecifier>,
        env: &mut Env,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        let span = spec.span;
        match spec.node {
            TypeSpecifier::Void => self.set_base_type(BaseType::Void, span, ec)?,
            TypeSpecifier::Char => self.set_base_type(BaseType::Char, span, ec)?,
            TypeSpecifier::Int => self.set_base_type(BaseType::Int, span, ec)?,
            TypeSpecifier::Bool => self.set_base_type(BaseType::Bool, span, ec)?,
            TypeSpecifier::Signed => self.set_signed(true, span, ec)?,
            TypeSpecifier::Unsigned => self.set_signed(false, span, ec)?,
            TypeSpecifier::Long => self.set_long(span, ec)?,
            TypeSpecifier::Short => self.set_short(span, ec)?,
            TypeSpecifier::Float | TypeSpecifier::Double => {
                ec.record_error(
                    CompileError::Unimplemented("floating point types".to_string()),
                    span,
                )?;
            }
            TypeSpecifier::Int128 => {
                if !env.machine.int128 {
                    ec.record_error(CompileError::Int128Unsupported, span)?;
                }
                self.set_base_type(BaseType::Int128, span, ec)?
            }
            TypeSpecifier::BitInt(width) => {
                if !env.lang.is_c23() {
                    ec.record_warning(CompileWarning::C23Extension("'_BitInt'".to_string()), span)?;
                }
                let width_span = width.span;
                let v = constant::compute_constant_expr(*width, env, ec)?;
                if !v.t.t.is_integer() {
                    ec.record_error(CompileError::IntegerTypeRequired, width_span)?;
                }
                self.set_base_type(BaseType::BitInt(v.unwrap_integer().clone()), span, ec)?
            }
            TypeSpecifier::Enum(e) => {
                let name = match &e.node.identifier {
                    Some(id) => format!("enum {}", id.node),
                    None => "enum <anonymous>".to_string(),
                };
                let t = process_enum_node(e, env, ec)?;
                self.set_base_type(BaseType::Enum(name, t), span, ec)?
            }
            TypeSpecifier::TypedefName(n) => self.set_alias(n.node, n.span, env, ec)?,
        }
        Ok(())
    }

    pub fn stage2(
        mut self,
        span: Span,
        env: &Env,
        ec: &mut ErrorCollector,
    ) -> Result<TypeBuilderStage2, ()> {
        let m = env.machine;
        if self.base_type.is_none()
            && matches!(self.modifier, TypeModifier::None)
            && matches!(self.sign, SignModifier::Default)
        {
            if env.lang.is_c23() {
                ec.record_error(CompileError::MissingType, span)?;
            } else {
                ec.record_warning(CompileWarning::ImplicitInt, span)?;
            }
        }

        let signed = match self.sign {
            SignModifier::Signed => true,
            SignModifier::Unsigned => false,
            SignModifier::Default => {
                if let Some(BaseType::Char) = self.base_type {
                    m.char_signed
                } else {
                    // int is signed by default
                    true
                }
            }
        };

        let extra_qualifiers = match &self.base_type {
            Some(BaseType::Alias(_, t)) => t.qualifiers,
            _ => Qualifiers::empty(),
        };
        let t = match self.base_type.take() {
            None | Some(BaseType::Int) => {
                let kind = match self.modifier {
                    TypeModifier::None => IntKind::Int,
                    TypeModifier::Short => IntKind::Short,
                    TypeModifier::Long => IntKind::Long,
                    TypeModifier::LongLong => IntKind::LongLong,
                };
                CType::Int(kind, signed)
            }
            Some(BaseType::Void) => CType::Void,
            Some(BaseType::Char) => match self.sign {
                SignModifier::Default => ctype::char_type(m),
                _ => CType::Int(IntKind::Char, signed),
            },
            Some(BaseType::Bool) => CType::Bool,
            Some(BaseType::Int128) => CType::Int(IntKind::Int128, signed),
            Some(BaseType::BitInt(n)) => {
                let min = if signed { 2 } else { 1 };
                match n.to_u32() {
                    Some(n) if n >= min && n <= machine::BITINT_MAXWIDTH => {
                        CType::Int(IntKind::BitInt(n), signed)
                    }
                    _ => {
                        ec.record_error(CompileError::BadBitIntWidth(n.to_string(), signed), span)?;
                        unreachable!()
                    }
                }
            }
            Some(BaseType::Enum(_, t)) => t,
            Some(BaseType::Alias(_, t)) => t.t,
        };

        Ok(TypeBuilderStage2 {
            base_type: QualifiedType {
                t,
                qualifiers: self.qualifiers | extra_qualifiers,
            },
        })
    }

    fn set_base_type(
        &mut self,
        t: BaseType,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        if self.base_type.is_none() {
            self.base_type = Some(t);
            self.check_consistency(span, ec)
        } else {
            ec.record_error(CompileError::MultipleTypes, span)
        }
    }

    fn set_signed(&mut self, signed: bool, span: Span, ec: &mut ErrorCollector) -> Result<(), ()> {
        if let SignModifier::Default = self.sign {
            self.sign = match signed {
                true => SignModifier::Signed,
                false => SignModifier::Unsigned,
            };
            self.check_consistency(span, ec)
        } else {
            ec.record_error(CompileError::MultipleSignSpecifiers, span)
        }
    }

    fn set_short(&mut self, span: Span, ec: &mut ErrorCollector) -> Result<(), ()> {
        if let TypeModifier::None = self.modifier {
            self.modifier = TypeModifier::Short;
            self.check_consistency(span, ec)
        } else {
            ec.record_error(CompileError::LongShortTogether, span)
        }
    }

    fn set_long(&mut self, span: Span, ec: &mut ErrorCollector) -> Result<(), ()> {
        match self.modifier {
            TypeModifier::None => self.modifier = TypeModifier::Long,
            TypeModifier::Long => self.modifier = TypeModifier::LongLong,
            TypeModifier::Short => return ec.record_error(CompileError::LongShortTogether, span),
            TypeModifier::LongLong => return ec.record_error(CompileError::TypeTooLong, span),
        }
        self.check_consistency(span, ec)
    }

    fn set_alias(
        &mut self,
        name: String,
        span: Span,
        env: &Env,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        let t = match env.scope.as_deref() {
            Some(scope) => scope.get_type_alias(&name, span, ec)?.clone(),
            None => {
                ec.record_error(CompileError::ForbiddenInPreprocessor("type name".to_string()), span)?;
                unreachable!()
            }
        };
        self.set_base_type(BaseType::Alias(name, t), span, ec)
    }

    fn check_consistency(&self, span: Span, ec: &mut ErrorCollector) -> Result<(), ()> {
        let base_type = match &self.base_type {
            None => return Ok(()),
            Some(base_type) => base_type,
        };
        let modifier_ok = match base_type {
            BaseType::Int => true,
            BaseType::Char
            | BaseType::Int128
            | BaseType::BitInt(_)
            | BaseType::Void
            | BaseType::Bool
            | BaseType::Enum(_, _)
            | BaseType::Alias(_, _) => matches!(self.modifier, TypeModifier::None),
        };
        let sign_ok = match base_type {
            BaseType::Int | BaseType::Char | BaseType::Int128 | BaseType::BitInt(_) => true,
            BaseType::Void | BaseType::Bool | BaseType::Enum(_, _) | BaseType::Alias(_, _) => {
                matches!(self.sign, SignModifier::Default)
            }
        };
        if modifier_ok && sign_ok {
            Ok(())
        } else {
            ec.record_error(CompileError::WrongModifiers(base_type.to_string()), span)
        }
    }
}

impl TypeBuilderStage2 {
    pub fn add_derived_declarator_node(
        &mut self,
        dd: Node<DerivedDeclarator>,
        env: &mut Env,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        match dd.node {
            DerivedDeclarator::Pointer(pqs) => {
                let mut qualifiers = Qualifiers::empty();
                for pq in pqs {
                    qualifiers |= convert_qualifier(pq.node);
                }
                self.base_type.wrap_pointer(qualifiers);
            }
            DerivedDeclarator::Array(None) => {
                self.check_element_type(dd.span, ec)?;
                self.base_type.wrap_array(None);
            }
            DerivedDeclarator::Array(Some(size)) => {
                self.check_element_type(dd.span, ec)?;
                let size_span = size.span;
                let v = constant::compute_constant_expr(*size, env, ec)?;
                if !v.t.t.is_integer() {
                    return ec.record_error(CompileError::IntegerTypeRequired, size_span);
                }
                let n = v.unwrap_integer();
                match n.to_u64() {
                    Some(n) if n > 0 => {
                        self.base_type.wrap_array(Some(n));
                        self.base_type.t.sizeof(env.machine, size_span, ec)?;
                    }
                    _ => {
                        return ec.record_error(CompileError::BadArraySize(n.to_string()), size_span)
                    }
                }
            }
            DerivedDeclarator::Function => {
                return ec.record_error(
                    CompileError::Unimplemented("function declarations".to_string()),
                    dd.span,
                );
            }
        }
        Ok(())
    }

    fn check_element_type(&self, span: Span, ec: &mut ErrorCollector) -> Result<(), ()> {
        match &self.base_type.t {
            CType::Void | CType::Array(_, None) => ec.record_error(
                CompileError::IncompleteType(self.base_type.to_string()),
                span,
            ),
            _ => Ok(()),
        }
    }

    pub fn finalize(self) -> QualifiedType {
        self.base_type
    }
}

/**
 * Declare the enumeration and its constants, and return the type its objects have.
 *
 * Constants without an explicit value continue from the previous one. Without a fixed
 * underlying type a constant is `int` when its value fits and the first of `long`,
 * `long long`, `__int128` that holds it otherwise.
 */
fn process_enum_node(
    e: Node<EnumType>,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<CType, ()> {
    let span = e.span;
    let EnumType {
        identifier,
        fixed_type,
        enumerators,
    } = e.node;
    let fixed = match fixed_type {
        Some(tn) => {
            let tn_span = tn.span;
            let t = TypeBuilder::build_type_name(*tn, env, ec)?;
            if !t.t.is_integer() || t.t.is_bit_precise() {
                ec.record_error(CompileError::IntegerTypeRequired, tn_span)?;
                unreachable!()
            }
            Some(t.t)
        }
        None => None,
    };

    let enumerators = match enumerators {
        Some(list) => list,
        None => {
            let id = match identifier {
                Some(id) => id,
                None => unreachable!(), // the parser requires a name or a list
            };
            let scope = match env.scope.as_deref_mut() {
                Some(scope) => scope,
                None => unreachable!(),
            };
            return scope.reference_enum(&id.node, fixed, id.span, ec);
        }
    };

    let m = env.machine;
    let mut next = BigInt::from(0);
    let mut values = Vec::new();
    for enumerator in enumerators {
        let name = enumerator.node.identifier;
        let value = match enumerator.node.expression {
            Some(expr) => {
                let expr_span = expr.span;
                let v = constant::compute_constant_expr(*expr, env, ec)?;
                if !v.t.t.is_integer() {
                    ec.record_error(CompileError::IntegerTypeRequired, expr_span)?;
                    unreachable!()
                }
                v.unwrap_integer().clone()
            }
            None => next.clone(),
        };
        let t = match &fixed {
            Some(t) => {
                if !t.fits(&value, m) {
                    ec.record_error(CompileError::EnumValueOutOfRange(name.node), name.span)?;
                    unreachable!()
                }
                t.clone()
            }
            None => {
                let mut candidates = vec![ctype::INT_TYPE, ctype::LONG_TYPE, ctype::LLONG_TYPE];
                if m.int128 {
                    candidates.push(ctype::INT128_TYPE);
                }
                candidates.extend([ctype::UINT_TYPE, ctype::ULONG_TYPE, ctype::ULLONG_TYPE]);
                if m.int128 {
                    candidates.push(ctype::UINT128_TYPE);
                }
                match candidates.into_iter().find(|t| t.fits(&value, m)) {
                    Some(t) => t,
                    None => {
                        ec.record_error(CompileError::EnumValueOutOfRange(name.node), name.span)?;
                        unreachable!()
                    }
                }
            }
        };
        next = &value + BigInt::one();
        let v = TypedValue::new_integer(value, t, m);
        let scope = match env.scope.as_deref_mut() {
            Some(scope) => scope,
            None => unreachable!(),
        };
        scope.declare_enum_constant(&name.node, v.clone(), name.span, ec)?;
        values.push(v);
    }

    let underlying = match fixed {
        Some(t) => t,
        None => enum_compatible_type(&values, env),
    };
    if let Some(id) = identifier {
        let scope = match env.scope.as_deref_mut() {
            Some(scope) => scope,
            None => unreachable!(),
        };
        scope.declare_enum(&id.node, underlying.clone(), id.span.join(span), ec)?;
    }
    Ok(underlying)
}

/**
 * The integer type compatible with an enumeration without a fixed underlying type:
 * `unsigned int` when no value is negative, else `int`, widening as needed.
 */
fn enum_compatible_type(values: &[TypedValue], env: &Env) -> CType {
    let m = env.machine;
    let negative = values.iter().any(|v| v.is_negative());
    let mut candidates = if negative {
        vec![ctype::INT_TYPE, ctype::LONG_TYPE, ctype::LLONG_TYPE, ctype::INT128_TYPE]
    } else {
        vec![ctype::UINT_TYPE, ctype::ULONG_TYPE, ctype::ULLONG_TYPE, ctype::UINT128_TYPE]
    };
    if !m.int128 {
        candidates.pop();
    }
    let last = candidates[candidates.len() - 1].clone();
    candidates
        .into_iter()
        .find(|t| values.iter().all(|v| t.fits(v.unwrap_integer(), m)))
        .unwrap_or(last)
}

fn convert_qualifier(q: TypeQualifier) -> Qualifiers {
    match q {
        TypeQualifier::Const => Qualifiers::CONST,
        TypeQualifier::Restrict => Qualifiers::RESTRICT,
        TypeQualifier::Volatile => Qualifiers::VOLATILE,
        TypeQualifier::Atomic => Qualifiers::ATOMIC,
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            BaseType::Void => f.write_str("void"),
            BaseType::Char => f.write_str("char"),
            BaseType::Int => f.write_str("int"),
            BaseType::Bool => f.write_str("_Bool"),
            BaseType::Int128 => f.write_str("__int128"),
            BaseType::BitInt(n) => write!(f, "_BitInt({})", n),
            BaseType::Enum(name, _) => f.write_str(name),
            BaseType::Alias(name, t) => write!(f, "{} (aka {})", name, t),
        }
    }
}
