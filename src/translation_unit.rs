use num::BigInt;
use num_traits::Zero;

use crate::ast::{
    Declaration, DeclarationSpecifier, Expression, ExternalDeclaration, Initializer,
    InitDeclarator, StorageClassSpecifier, TypeSpecifier,
};
use crate::cmdline::LangOptions;
use crate::constant::{self, Env};
use crate::ctype::{self, CType, IntKind, QualifiedType, Qualifiers};
use crate::error::{CompileError, CompileWarning, ErrorCollector};
use crate::machine::Machine;
use crate::name_scope::{GlobalStorageClass, NameScope};
use crate::span::{Node, Span};
use crate::type_builder::{TypeBuilder, TypeBuilderStage2};
use crate::value::{TypedValue, Value};

pub struct TranslationUnit {
    pub scope: NameScope,
}

/**
 * Type names every translation unit starts with.
 */
pub fn builtin_typedefs(machine: &Machine) -> Vec<(&'static str, CType)> {
    if machine.int128 {
        vec![
            ("__int128_t", ctype::INT128_TYPE),
            ("__uint128_t", ctype::UINT128_TYPE),
        ]
    } else {
        Vec::new()
    }
}

enum StorageClass {
    Typedef,
    Var(GlobalStorageClass),
    Constexpr,
}

impl TranslationUnit {
    /**
     * Process the external declarations in order. A failed declaration is reported and
     * skipped, so that every failing static assertion of the unit gets a diagnostic.
     */
    pub fn translate(
        tu: crate::ast::TranslationUnit,
        machine: &Machine,
        lang: &LangOptions,
        ec: &mut ErrorCollector,
    ) -> Result<Self, ()> {
        let mut r = Self {
            scope: NameScope::new(),
        };
        for (name, t) in builtin_typedefs(machine) {
            r.scope
                .declare_typedef(name, QualifiedType::new(t), Span::none(), ec)?;
        }
        if tu.0.is_empty() {
            ec.record_warning(CompileWarning::EmptyTranslationUnit, Span::none())?;
        }
        let mut has_error = false;
        for Node { node: ed, .. } in tu.0.into_iter() {
            let result = match ed {
                ExternalDeclaration::StaticAssert(sa) => {
                    let mut env = Env::new(machine, lang, &mut r.scope);
                    constant::check_static_assert(sa, &mut env, ec)
                }
                ExternalDeclaration::Declaration(n) => r.add_declaration(n, machine, lang, ec),
            };
            if result.is_err() {
                has_error = true;
            }
        }
        tracing::debug!(has_error, "translated");
        if has_error {
            Err(())
        } else {
            Ok(r)
        }
    }

    fn add_declaration(
        &mut self,
        n: Node<Declaration>,
        machine: &Machine,
        lang: &LangOptions,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        let span = n.span;
        let decl = n.node;
        let mut storage_class: Option<Node<StorageClassSpecifier>> = None;
        let mut is_constexpr = false;
        let mut function_specifier = None;
        let mut declares_tag = false;
        let mut type_builder = TypeBuilder::new();
        {
            let mut env = Env::new(machine, lang, &mut self.scope);
            for Node { node: declspec, .. } in decl.specifiers {
                match declspec {
                    DeclarationSpecifier::StorageClass(sc) => match sc.node {
                        StorageClassSpecifier::Auto | StorageClassSpecifier::Register => {
                            return ec.record_error(
                                CompileError::WrongStorageClass(sc.node.to_string()),
                                sc.span,
                            );
                        }
                        StorageClassSpecifier::Constexpr if !is_constexpr => is_constexpr = true,
                        // `_Thread_local` does not change what a constant expression sees
                        StorageClassSpecifier::ThreadLocal => (),
                        _ if storage_class.is_none() => storage_class = Some(sc),
                        _ => return ec.record_error(CompileError::MultipleStorageClasses, sc.span),
                    },
                    DeclarationSpecifier::TypeSpecifier(ts) => {
                        if let TypeSpecifier::Enum(e) = &ts.node {
                            declares_tag |= e.node.enumerators.is_some()
                                || e.node.fixed_type.is_some();
                        }
                        type_builder.add_type_specifier_node(ts, &mut env, ec)?
                    }
                    DeclarationSpecifier::TypeQualifier(tq) => {
                        type_builder.add_type_qualifier_node(tq, ec)?
                    }
                    DeclarationSpecifier::Function(f) => function_specifier = Some(f),
                }
            }
        }

        let storage_class = match (storage_class, is_constexpr) {
            (None, true) => StorageClass::Constexpr,
            (Some(sc), true) if sc.node == StorageClassSpecifier::Static => StorageClass::Constexpr,
            (Some(sc), true) => {
                return ec.record_error(CompileError::WrongStorageClass(sc.node.to_string()), sc.span)
            }
            (None, false) => StorageClass::Var(GlobalStorageClass::Default),
            (Some(sc), false) => match sc.node {
                StorageClassSpecifier::Typedef => StorageClass::Typedef,
                StorageClassSpecifier::Extern => StorageClass::Var(GlobalStorageClass::Extern),
                StorageClassSpecifier::Static => StorageClass::Var(GlobalStorageClass::Static),
                // filtered out above
                _ => unreachable!(),
            },
        };
        if let Some(f) = function_specifier {
            return ec.record_error(
                CompileError::WrongModifiers(format!("{:?}", f.node).to_lowercase()),
                f.span,
            );
        }

        if decl.declarators.is_empty() {
            if !declares_tag {
                ec.record_warning(CompileWarning::EmptyDeclaration, span)?;
            }
            let mut env = Env::new(machine, lang, &mut self.scope);
            type_builder.stage2(span, &mut env, ec)?;
            return Ok(());
        }

        let stage2 = {
            let mut env = Env::new(machine, lang, &mut self.scope);
            type_builder.stage2(span, &mut env, ec)?
        };
        let mut has_error = false;
        for init_declarator in decl.declarators {
            if self
                .process_init_declarator_node(
                    init_declarator,
                    &storage_class,
                    stage2.clone(),
                    machine,
                    lang,
                    ec,
                )
                .is_err()
            {
                has_error = true;
            }
        }
        if has_error {
            Err(())
        } else {
            Ok(())
        }
    }

    fn process_init_declarator_node(
        &mut self,
        init_declarator: Node<InitDeclarator>,
        storage_class: &StorageClass,
        mut type_builder: TypeBuilderStage2,
        machine: &Machine,
        lang: &LangOptions,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        let span = init_declarator.span;
        let InitDeclarator {
            declarator,
            initializer,
        } = init_declarator.node;
        let mut env = Env::new(machine, lang, &mut self.scope);
        for dd in declarator.node.derived {
            type_builder.add_derived_declarator_node(dd, &mut env, ec)?;
        }
        let t = type_builder.finalize();
        let id = match declarator.node.identifier {
            Some(id) => id.node,
            None => {
                ec.record_warning(CompileWarning::EmptyDeclaration, span)?;
                return Ok(());
            }
        };

        match storage_class {
            StorageClass::Typedef => {
                if let Some(initializer) = initializer {
                    return ec.record_error(CompileError::TypedefInitialized, initializer.span);
                }
                self.scope.declare_typedef(&id, t, span, ec)
            }
            StorageClass::Var(st_class) => {
                let (t, initialized) = match initializer {
                    Some(initializer) => (process_initializer(initializer, t, &mut env, ec)?, true),
                    None => (t, false),
                };
                self.scope
                    .declare_var(&id, t, *st_class, initialized, span, ec)
            }
            StorageClass::Constexpr => {
                let initializer = match initializer {
                    Some(initializer) => initializer,
                    None => {
                        return ec.record_error(CompileError::ConstexprNotInitialized(id), span)
                    }
                };
                if !t.t.is_scalar() {
                    return ec.record_error(
                        CompileError::Unimplemented(format!("constexpr object of type `{}'", t)),
                        span,
                    );
                }
                let mut t = t;
                t.qualifiers |= Qualifiers::CONST;
                let value = constexpr_value(&id, initializer, &t, &mut env, ec)?;
                self.scope.declare_constexpr(&id, value, span, ec)
            }
        }
    }
}

/**
 * Check an initializer against the declared type. An array of unknown size gets its size
 * from the initializer.
 */
fn process_initializer(
    initializer: Node<Initializer>,
    t: QualifiedType,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<QualifiedType, ()> {
    let span = initializer.span;
    let array = match &t.t {
        CType::Array(elem, size) => Some(((**elem).clone(), *size)),
        _ => None,
    };
    match (initializer.node, array) {
        (Initializer::Expression(expr), Some((elem, size))) => {
            let parts = match expr.node {
                Expression::StringLiteral(parts) => parts,
                _ => {
                    ec.record_error(CompileError::Unimplemented("array initializer".to_string()), span)?;
                    unreachable!()
                }
            };
            let (literal, len) =
                constant::string_literal_array(&parts, span, env.machine, env.lang, ec)?;
            let compatible = if is_char_type(&elem.t) {
                is_char_type(&literal)
            } else {
                elem.t == literal
            };
            if !compatible {
                ec.record_error(CompileError::Unimplemented("array initializer".to_string()), span)?;
                unreachable!()
            }
            // without the terminating zero
            let len = len - 1;
            match size {
                // the terminating zero may be dropped
                Some(size) if size < len => {
                    ec.record_error(CompileError::ExcessInitializers, span)?;
                    unreachable!()
                }
                Some(_) => Ok(t),
                None => Ok(QualifiedType {
                    t: CType::Array(Box::new(elem), Some(len + 1)),
                    qualifiers: t.qualifiers,
                }),
            }
        }
        (Initializer::List(items), Some((elem, size))) => {
            let count = items.len() as u64;
            if let Some(size) = size {
                if count > size {
                    ec.record_error(CompileError::ExcessInitializers, span)?;
                }
            }
            for item in items {
                process_initializer(item, elem.clone(), env, ec)?;
            }
            match size {
                Some(_) => Ok(t),
                None => Ok(QualifiedType {
                    t: CType::Array(Box::new(elem), Some(count)),
                    qualifiers: t.qualifiers,
                }),
            }
        }
        (Initializer::Expression(expr), None) => {
            if let Expression::StringLiteral(_) = expr.node {
                return match &t.t {
                    CType::Pointer(target) if is_char_type(&target.t) => Ok(t),
                    _ => {
                        ec.record_error(CompileError::NonConstInConstExpr, span)?;
                        unreachable!()
                    }
                };
            }
            scalar_value(*expr, &t, env, ec)?;
            Ok(t)
        }
        (Initializer::List(items), None) => {
            if let Some(item) = single_item(items, ec)? {
                process_initializer(item, t.clone(), env, ec)?;
            }
            Ok(t)
        }
    }
}

/**
 * The only element of a braced scalar initializer, `None` for `{}`.
 */
fn single_item(
    items: Vec<Node<Initializer>>,
    ec: &mut ErrorCollector,
) -> Result<Option<Node<Initializer>>, ()> {
    let mut items = items.into_iter();
    let first = items.next();
    if let Some(extra) = items.next() {
        ec.record_error(CompileError::ExcessInitializers, extra.span)?;
    }
    Ok(first)
}

/**
 * Value of a `constexpr` initializer, converted to the object type. The conversion must
 * not change the value.
 */
fn constexpr_value(
    id: &str,
    initializer: Node<Initializer>,
    t: &QualifiedType,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<TypedValue, ()> {
    let span = initializer.span;
    let expr = match initializer.node {
        Initializer::Expression(expr) => *expr,
        Initializer::List(items) => match single_item(items, ec)? {
            Some(item) => return constexpr_value(id, item, t, env, ec),
            None => {
                return Ok(TypedValue {
                    t: t.clone(),
                    val: Value::Int(BigInt::zero()),
                })
            }
        },
    };
    let (original, converted) = scalar_value(expr, t, env, ec)?;
    if original.val != converted.val {
        ec.record_error(CompileError::ConstexprValueChanged(id.to_string()), span)?;
    }
    Ok(converted)
}

fn scalar_value(
    expr: Node<Expression>,
    t: &QualifiedType,
    env: &mut Env,
    ec: &mut ErrorCollector,
) -> Result<(TypedValue, TypedValue), ()> {
    let span = expr.span;
    let value = constant::compute_constant_expr(expr, env, ec)?;
    check_assignable(t, &value, span, ec)?;
    let converted = constant::cast(value.clone(), t, span, env.machine, ec)?;
    Ok((value, converted))
}

/**
 * Implicit conversion as in assignment: arithmetic to arithmetic, pointer to a compatible
 * pointer, and the null pointer constant to any pointer.
 */
fn check_assignable(
    t: &QualifiedType,
    value: &TypedValue,
    span: Span,
    ec: &mut ErrorCollector,
) -> Result<(), ()> {
    let ok = match (&t.t, &value.t.t) {
        (target, source) if target.is_arithmetic() && source.is_arithmetic() => true,
        (CType::Pointer(_), CType::Pointer(_)) => value.t.is_compatible_to(t, false),
        (CType::Pointer(_), source) => source.is_integer() && value.is_zero(),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        ec.record_error(
            CompileError::IncompatibleTypes(t.clone(), value.t.clone()),
            span,
        )
    }
}

fn is_char_type(t: &CType) -> bool {
    matches!(t, CType::Int(IntKind::Char, _))
}
