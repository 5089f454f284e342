use num::BigInt;
use num_traits::Zero;
use std::collections::HashMap;

use crate::{
    ctype::{CType, QualifiedType},
    error::{CompileError, CompileWarning, ErrorCollector},
    span::Span,
    value::{TypedValue, Value as ConstValue},
};

/**
 * Keep track of the symbols of the translation unit.
 *
 * Only file scope exists: there are no function bodies to open inner scopes.
 */
pub struct NameScope {
    defs: HashMap<String, (Value, Span)>,
    enums: HashMap<String, (CType, Span)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Type(QualifiedType),
    StaticVar(QualifiedType, GlobalStorageClass, bool),
    Constexpr(TypedValue),
    EnumConstant(TypedValue),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum GlobalStorageClass {
    Default,
    Static,
    Extern,
}

impl Value {
    fn is_type(&self) -> bool {
        matches!(self, Value::Type(_))
    }

    fn is_var(&self) -> bool {
        matches!(self, Value::StaticVar(_, _, _))
    }
}

impl NameScope {
    pub fn new() -> Self {
        Self {
            defs: HashMap::new(),
            enums: HashMap::new(),
        }
    }

    /**
     * Declare a type alias. Redeclaring it with the same type is allowed.
     */
    pub fn declare_typedef(
        &mut self,
        name: &str,
        t: QualifiedType,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        if let Some((old_val, _)) = self.defs.get(name) {
            match old_val {
                Value::Type(old_t) => {
                    if !old_t.is_compatible_to(&t, true) {
                        return ec.record_error(CompileError::TypeRedefinition(name.to_string()), span);
                    }
                }
                _ => {
                    return ec.record_error(
                        CompileError::ConflictingStorageClass(name.to_string()),
                        span,
                    )
                }
            }
        }
        tracing::trace!(name, t = %t, "typedef");
        self.defs.insert(name.to_string(), (Value::Type(t), span));
        Ok(())
    }

    /**
     * Declare a file scope variable. Repeated declarations must agree in type and linkage,
     * and at most one of them may have an initializer.
     */
    pub fn declare_var(
        &mut self,
        name: &str,
        t: QualifiedType,
        storage_class: GlobalStorageClass,
        initialized: bool,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        let mut storage_class = storage_class;
        if initialized && storage_class == GlobalStorageClass::Extern {
            ec.record_warning(CompileWarning::ExternVarInitialized(name.to_string()), span)?;
            storage_class = GlobalStorageClass::Default;
        }
        let mut t = t;
        let mut initialized = initialized;
        if let Some((old_val, _)) = self.defs.get(name) {
            // check that both definitions are variables
            let (old_t, old_storage_class, old_initialized) = match old_val {
                Value::StaticVar(old_t, old_storage_class, old_initialized) => {
                    (old_t, *old_storage_class, *old_initialized)
                }
                _ => {
                    return ec.record_error(
                        CompileError::ConflictingStorageClass(name.to_string()),
                        span,
                    )
                }
            };

            // check storage classes compatibility
            storage_class = match match_storage_classes(old_storage_class, storage_class) {
                Some(class) => class,
                None => {
                    return ec.record_error(
                        CompileError::ConflictingStorageClass(name.to_string()),
                        span,
                    )
                }
            };

            // check types
            if !t.is_compatible_to(old_t, true) {
                return ec.record_error(CompileError::ConflictingTypes(name.to_string()), span);
            }
            // a later declaration may complete an array type
            if let CType::Array(_, None) = t.t {
                t = old_t.clone();
            }

            // check initializers
            if old_initialized && initialized {
                return ec.record_error(CompileError::VarRedefinition(name.to_string()), span);
            }
            initialized |= old_initialized;
        }
        tracing::trace!(name, t = %t, ?storage_class, "variable");
        self.defs.insert(
            name.to_string(),
            (Value::StaticVar(t, storage_class, initialized), span),
        );
        Ok(())
    }

    /**
     * Declare a `constexpr` object. Its value is usable in constant expressions.
     */
    pub fn declare_constexpr(
        &mut self,
        name: &str,
        value: TypedValue,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        if self.defs.contains_key(name) {
            return ec.record_error(CompileError::VarRedefinition(name.to_string()), span);
        }
        tracing::trace!(name, "constexpr");
        self.defs
            .insert(name.to_string(), (Value::Constexpr(value), span));
        Ok(())
    }

    pub fn declare_enum_constant(
        &mut self,
        name: &str,
        value: TypedValue,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        if self.defs.contains_key(name) {
            return ec.record_error(CompileError::VarRedefinition(name.to_string()), span);
        }
        tracing::trace!(name, value = %value.unwrap_integer(), "enumerator");
        self.defs
            .insert(name.to_string(), (Value::EnumConstant(value), span));
        Ok(())
    }

    /**
     * Declare an enumeration tag with the integer type its objects have.
     */
    pub fn declare_enum(
        &mut self,
        name: &str,
        t: CType,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<(), ()> {
        if self.enums.contains_key(name) {
            return ec.record_error(CompileError::TypeRedefinition(format!("enum {}", name)), span);
        }
        self.enums.insert(name.to_string(), (t, span));
        Ok(())
    }

    /**
     * `enum name` without a list. With a fixed underlying type it may declare the tag.
     */
    pub fn reference_enum(
        &mut self,
        name: &str,
        fixed: Option<CType>,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<CType, ()> {
        match (self.enums.get(name), fixed) {
            (Some((t, _)), None) => Ok(t.clone()),
            (Some((t, _)), Some(fixed)) => {
                if *t != fixed {
                    ec.record_error(CompileError::ConflictingTypes(format!("enum {}", name)), span)?;
                }
                Ok(fixed)
            }
            (None, Some(fixed)) => {
                self.enums.insert(name.to_string(), (fixed.clone(), span));
                Ok(fixed)
            }
            (None, None) => {
                ec.record_error(CompileError::IncompleteType(format!("enum {}", name)), span)?;
                unreachable!()
            }
        }
    }

    pub fn get_type_alias(
        &self,
        name: &str,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<&QualifiedType, ()> {
        if let Some((val, _)) = self.defs.get(name) {
            if let Value::Type(t) = val {
                return Ok(t);
            } else {
                ec.record_error(CompileError::NotAType(name.to_string()), span)?;
                unreachable!();
            }
        }
        ec.record_error(CompileError::UnknownIdentifier(name.to_string()), span)?;
        unreachable!();
    }

    /**
     * Value of an identifier in a constant expression.
     *
     * Ordinary variables are only allowed where the value is not needed, e.g. under `sizeof`;
     * there they give a placeholder of the right type.
     */
    pub fn get_constant(
        &self,
        name: &str,
        unevaluated: bool,
        span: Span,
        ec: &mut ErrorCollector,
    ) -> Result<TypedValue, ()> {
        match self.defs.get(name) {
            Some((Value::EnumConstant(v), _)) | Some((Value::Constexpr(v), _)) => Ok(v.clone()),
            Some((Value::StaticVar(t, _, _), _)) if unevaluated => {
                let val = if t.t.is_integer() || t.t.is_pointer() {
                    ConstValue::Int(BigInt::zero())
                } else {
                    ConstValue::Void
                };
                Ok(TypedValue {
                    t: t.clone(),
                    val,
                })
            }
            Some((val, _)) if val.is_var() => {
                ec.record_error(CompileError::VariablesForbidden(name.to_string()), span)?;
                unreachable!()
            }
            Some((val, _)) if val.is_type() => {
                ec.record_error(CompileError::NotAVar(name.to_string()), span)?;
                unreachable!()
            }
            _ => {
                ec.record_error(CompileError::UnknownIdentifier(name.to_string()), span)?;
                unreachable!()
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.defs.get(name).map(|(v, _)| v)
    }
}

fn match_storage_classes(
    old: GlobalStorageClass,
    new: GlobalStorageClass,
) -> Option<GlobalStorageClass> {
    use GlobalStorageClass::*;
    match (old, new) {
        (a, b) if a == b => Some(a),
        // `extern` after `static` keeps internal linkage
        (Static, Extern) => Some(Static),
        (Default, Extern) | (Extern, Default) => Some(Default),
        _ => None,
    }
}
