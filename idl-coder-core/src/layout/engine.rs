use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, trace};

use super::{
    DefinedLayout, EnumLayout, FieldLayout, IntKind, Layout, LazyLayout, StructLayout,
    VariantLayout,
};
use crate::error::SchemaError;
use crate::idl::{
    Idl, IdlArrayLen, IdlDefinedFields, IdlField, IdlGenericArg, IdlType, IdlTypeDefGeneric,
    IdlTypeDefTy,
};

type Slot = Arc<OnceLock<Arc<DefinedLayout>>>;

/// Generic parameter name -> bound argument. Arguments are always closed
/// (free of `{generic}` slots) by the time they are bound.
type Scope = HashMap<String, IdlGenericArg>;

const MAX_VARIANTS: usize = 256;

/// Builds [`Layout`]s for one IDL and caches every named type it builds.
///
/// Named types are keyed by their instantiated name (`Pair<u8, 4>`), so
/// each is built once per engine. A reference to a type that is still being
/// built becomes a [`Layout::Lazy`], which is how recursive types terminate.
/// Such a reference must sit under an `option`, `coption`, `vec` or enum
/// variant, otherwise the type has no finite encoding and is rejected with
/// [`SchemaError::InfiniteType`].
#[derive(Debug)]
pub struct LayoutEngine {
    idl: Arc<Idl>,
    cache: Mutex<HashMap<String, Slot>>,
}

impl LayoutEngine {
    pub fn new(idl: Arc<Idl>) -> Self {
        Self {
            idl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn idl(&self) -> &Arc<Idl> {
        &self.idl
    }

    /// Build the layout of an arbitrary type reference.
    pub fn build(&self, ty: &IdlType) -> Result<Layout, SchemaError> {
        self.with_builder(|builder| builder.build_type(ty, &Scope::new()))
    }

    /// Build the layout of the named type (or inline account type).
    pub fn build_defined(&self, name: &str) -> Result<Layout, SchemaError> {
        self.build(&IdlType::defined(name))
    }

    /// Build an anonymous struct from a field list, such as instruction
    /// arguments or the inline fields of an event.
    pub fn build_fields(&self, owner: &str, fields: &[IdlField]) -> Result<StructLayout, SchemaError> {
        self.with_builder(|builder| builder.build_named_fields(owner, fields, &Scope::new()))
    }

    /// Number of named layouts built so far.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // The lock is held for the whole build, so each named type is built by
    // one caller only. A failed build leaves no trace in the cache.
    fn with_builder<T>(
        &self,
        f: impl FnOnce(&mut Builder<'_>) -> Result<T, SchemaError>,
    ) -> Result<T, SchemaError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut builder = Builder {
            idl: &self.idl,
            cache: &mut *cache,
            inserted: Vec::new(),
            building: Vec::new(),
            breaks: 0,
        };
        let result = f(&mut builder);
        if let Err(err) = &result {
            debug!(error = %err, discarded = builder.inserted.len(), "layout build failed");
            for key in std::mem::take(&mut builder.inserted) {
                builder.cache.remove(&key);
            }
        }
        result
    }
}

struct Builder<'a> {
    idl: &'a Idl,
    cache: &'a mut HashMap<String, Slot>,
    inserted: Vec<String>,
    /// Named types under construction, with the value of `breaks` when each
    /// was entered.
    building: Vec<(String, usize)>,
    /// Number of option, coption, vec and enum variant boundaries around the
    /// type currently being built.
    breaks: usize,
}

/// A type definition found by name: generic parameters and body.
struct Definition<'a> {
    generics: &'a [IdlTypeDefGeneric],
    ty: &'a IdlTypeDefTy,
}

impl<'a> Builder<'a> {
    fn build_type(&mut self, ty: &IdlType, scope: &Scope) -> Result<Layout, SchemaError> {
        let layout = match ty {
            IdlType::Bool => Layout::Bool,
            IdlType::U8 => Layout::Int(IntKind::U8),
            IdlType::I8 => Layout::Int(IntKind::I8),
            IdlType::U16 => Layout::Int(IntKind::U16),
            IdlType::I16 => Layout::Int(IntKind::I16),
            IdlType::U32 => Layout::Int(IntKind::U32),
            IdlType::I32 => Layout::Int(IntKind::I32),
            IdlType::U64 => Layout::Int(IntKind::U64),
            IdlType::I64 => Layout::Int(IntKind::I64),
            IdlType::U128 => Layout::Int(IntKind::U128),
            IdlType::I128 => Layout::Int(IntKind::I128),
            IdlType::U256 => Layout::Int(IntKind::U256),
            IdlType::I256 => Layout::Int(IntKind::I256),
            IdlType::F32 => Layout::F32,
            IdlType::F64 => Layout::F64,
            IdlType::String => Layout::String,
            IdlType::Bytes => Layout::Bytes,
            IdlType::Pubkey => Layout::Pubkey,
            IdlType::Option(inner) => Layout::Option(self.build_boxed(inner, scope)?),
            IdlType::COption(inner) => Layout::COption(self.build_boxed(inner, scope)?),
            IdlType::Vec(inner) => Layout::Vec(self.build_boxed(inner, scope)?),
            IdlType::Array(inner, len) => {
                let len = resolve_array_len(len, scope)?;
                if len == 0 {
                    return Err(SchemaError::ZeroLengthArray {
                        ty: inner.to_string(),
                    });
                }
                Layout::Array(Box::new(self.build_type(inner, scope)?), len)
            }
            IdlType::Defined { name, generics } => {
                let args = generics
                    .iter()
                    .map(|arg| substitute_arg(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                self.build_named(name, args)?
            }
            IdlType::Generic(name) => match scope.get(name) {
                // Bound arguments are closed, so they need no scope.
                Some(IdlGenericArg::Type { ty }) => self.build_type(ty, &Scope::new())?,
                Some(IdlGenericArg::Const { .. }) => {
                    return Err(SchemaError::GenericKind {
                        name: name.clone(),
                        expected: "type",
                    })
                }
                None => return Err(SchemaError::UnboundGeneric { name: name.clone() }),
            },
        };
        Ok(layout)
    }

    /// Build a type that may be absent from an encoding, such as the inner
    /// type of an option.
    fn build_boxed(&mut self, ty: &IdlType, scope: &Scope) -> Result<Box<Layout>, SchemaError> {
        self.breaks += 1;
        let layout = self.build_type(ty, scope);
        self.breaks -= 1;
        layout.map(Box::new)
    }

    fn build_named(&mut self, name: &str, args: Vec<IdlGenericArg>) -> Result<Layout, SchemaError> {
        let key = if args.is_empty() {
            name.to_string()
        } else {
            let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            format!("{}<{}>", name, rendered.join(", "))
        };

        if let Some(slot) = self.cache.get(&key) {
            return Ok(match slot.get() {
                Some(defined) => {
                    trace!(name = %key, "layout cache hit");
                    Layout::Defined(defined.clone())
                }
                None => {
                    let entered = self
                        .building
                        .iter()
                        .rev()
                        .find(|(name, _)| *name == key)
                        .map(|(_, breaks)| *breaks);
                    if entered == Some(self.breaks) {
                        return Err(SchemaError::InfiniteType { name: key });
                    }
                    trace!(name = %key, "recursive reference");
                    Layout::Lazy(LazyLayout {
                        name: key,
                        slot: Arc::downgrade(slot),
                    })
                }
            });
        }

        let definition = self.find_definition(name)?;
        if definition.generics.len() != args.len() {
            return Err(SchemaError::GenericArity {
                name: name.to_string(),
                expected: definition.generics.len(),
                actual: args.len(),
            });
        }
        let mut scope = Scope::new();
        for (param, arg) in definition.generics.iter().zip(args) {
            match (param, &arg) {
                (IdlTypeDefGeneric::Type { .. }, IdlGenericArg::Type { .. })
                | (IdlTypeDefGeneric::Const { .. }, IdlGenericArg::Const { .. }) => {}
                (IdlTypeDefGeneric::Type { name }, IdlGenericArg::Const { .. }) => {
                    return Err(SchemaError::GenericKind {
                        name: name.clone(),
                        expected: "type",
                    })
                }
                (IdlTypeDefGeneric::Const { name, .. }, IdlGenericArg::Type { .. }) => {
                    return Err(SchemaError::GenericKind {
                        name: name.clone(),
                        expected: "const",
                    })
                }
            }
            scope.insert(param.name().to_string(), arg);
        }

        let slot: Slot = Arc::new(OnceLock::new());
        self.cache.insert(key.clone(), slot.clone());
        self.inserted.push(key.clone());

        self.building.push((key.clone(), self.breaks));
        let layout = self.build_body(&key, definition.ty, &scope);
        self.building.pop();
        let layout = layout?;
        let defined = Arc::new(DefinedLayout { name: key, layout });
        // Fresh slot, only this call fills it.
        let _ = slot.set(defined.clone());
        debug!(name = %defined.name, size_hint = defined.layout.size_hint(), "built layout");
        Ok(Layout::Defined(defined))
    }

    /// Look `name` up in the type list and among accounts with an inline
    /// body. It must match exactly one entry.
    fn find_definition(&self, name: &str) -> Result<Definition<'a>, SchemaError> {
        let idl = self.idl;
        let types = idl.types.iter().filter(|t| t.name == name).map(|t| Definition {
            generics: &t.generics,
            ty: &t.ty,
        });
        let accounts = idl
            .accounts
            .iter()
            .filter(|a| a.name == name)
            .filter_map(|a| a.ty.as_ref())
            .map(|ty| Definition { generics: &[], ty });

        let mut found: Vec<Definition<'a>> = types.chain(accounts).collect();
        match found.len() {
            0 => Err(SchemaError::TypeNotFound {
                name: name.to_string(),
            }),
            1 => Ok(found.remove(0)),
            count => Err(SchemaError::AmbiguousType {
                name: name.to_string(),
                count,
            }),
        }
    }

    fn build_body(&mut self, name: &str, ty: &IdlTypeDefTy, scope: &Scope) -> Result<Layout, SchemaError> {
        match ty {
            IdlTypeDefTy::Struct { fields } => {
                Ok(Layout::Struct(self.build_struct(name, fields.as_ref(), scope)?))
            }
            IdlTypeDefTy::Enum { variants } => {
                if variants.len() > MAX_VARIANTS {
                    return Err(SchemaError::TooManyVariants {
                        name: name.to_string(),
                        count: variants.len(),
                    });
                }
                let mut seen = HashSet::new();
                let mut built = Vec::with_capacity(variants.len());
                for variant in variants {
                    if !seen.insert(variant.name.as_str()) {
                        return Err(SchemaError::DuplicateVariant {
                            name: name.to_string(),
                            variant: variant.name.clone(),
                        });
                    }
                    let owner = format!("{}::{}", name, variant.name);
                    // Other variants give every value a finite encoding.
                    self.breaks += 1;
                    let fields = self.build_struct(&owner, variant.fields.as_ref(), scope);
                    self.breaks -= 1;
                    built.push(VariantLayout {
                        name: variant.name.clone(),
                        fields: fields?,
                    });
                }
                Ok(Layout::Enum(EnumLayout { variants: built }))
            }
            IdlTypeDefTy::Alias { alias } => self.build_type(alias, scope),
        }
    }

    fn build_struct(
        &mut self,
        owner: &str,
        fields: Option<&IdlDefinedFields>,
        scope: &Scope,
    ) -> Result<StructLayout, SchemaError> {
        match fields {
            None => Ok(StructLayout::unit()),
            Some(IdlDefinedFields::Named(fields)) => self.build_named_fields(owner, fields, scope),
            Some(IdlDefinedFields::Tuple(types)) => {
                let fields = types
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| {
                        Ok(FieldLayout {
                            name: i.to_string(),
                            layout: self.build_type(ty, scope)?,
                        })
                    })
                    .collect::<Result<Vec<_>, SchemaError>>()?;
                Ok(StructLayout {
                    fields,
                    tuple: true,
                })
            }
        }
    }

    fn build_named_fields(
        &mut self,
        owner: &str,
        fields: &[IdlField],
        scope: &Scope,
    ) -> Result<StructLayout, SchemaError> {
        let mut seen = HashSet::new();
        let mut built = Vec::with_capacity(fields.len());
        for field in fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    name: owner.to_string(),
                    field: field.name.clone(),
                });
            }
            built.push(FieldLayout {
                name: field.name.clone(),
                layout: self.build_type(&field.ty, scope)?,
            });
        }
        Ok(StructLayout {
            fields: built,
            tuple: false,
        })
    }
}

fn resolve_array_len(len: &IdlArrayLen, scope: &Scope) -> Result<usize, SchemaError> {
    match len {
        IdlArrayLen::Value(n) => Ok(*n),
        IdlArrayLen::Generic { generic } => match scope.get(generic) {
            Some(IdlGenericArg::Const { value }) => parse_len(value),
            Some(IdlGenericArg::Type { .. }) => Err(SchemaError::GenericKind {
                name: generic.clone(),
                expected: "const",
            }),
            None => Err(SchemaError::UnboundGeneric {
                name: generic.clone(),
            }),
        },
    }
}

fn parse_len(value: &str) -> Result<usize, SchemaError> {
    value
        .trim()
        .parse()
        .map_err(|_| SchemaError::InvalidArrayLength {
            value: value.to_string(),
        })
}

/// Replace every generic slot in `arg` with its binding from `scope`.
fn substitute_arg(arg: &IdlGenericArg, scope: &Scope) -> Result<IdlGenericArg, SchemaError> {
    match arg {
        IdlGenericArg::Type { ty } => Ok(IdlGenericArg::Type {
            ty: substitute(ty, scope)?,
        }),
        // A const argument may forward an outer const parameter by name.
        IdlGenericArg::Const { value } => match scope.get(value) {
            Some(IdlGenericArg::Const { value: bound }) => Ok(IdlGenericArg::Const {
                value: bound.clone(),
            }),
            _ => Ok(arg.clone()),
        },
    }
}

fn substitute(ty: &IdlType, scope: &Scope) -> Result<IdlType, SchemaError> {
    let substituted = match ty {
        IdlType::Option(inner) => IdlType::option(substitute(inner, scope)?),
        IdlType::COption(inner) => IdlType::coption(substitute(inner, scope)?),
        IdlType::Vec(inner) => IdlType::vec(substitute(inner, scope)?),
        IdlType::Array(inner, len) => {
            let len = match len {
                IdlArrayLen::Generic { .. } => IdlArrayLen::Value(resolve_array_len(len, scope)?),
                IdlArrayLen::Value(n) => IdlArrayLen::Value(*n),
            };
            IdlType::Array(Box::new(substitute(inner, scope)?), len)
        }
        IdlType::Defined { name, generics } => IdlType::Defined {
            name: name.clone(),
            generics: generics
                .iter()
                .map(|arg| substitute_arg(arg, scope))
                .collect::<Result<_, _>>()?,
        },
        IdlType::Generic(name) => match scope.get(name) {
            Some(IdlGenericArg::Type { ty }) => ty.clone(),
            Some(IdlGenericArg::Const { .. }) => {
                return Err(SchemaError::GenericKind {
                    name: name.clone(),
                    expected: "type",
                })
            }
            None => return Err(SchemaError::UnboundGeneric { name: name.clone() }),
        },
        primitive => primitive.clone(),
    };
    Ok(substituted)
}
