use std::{fmt, sync::Arc};

use fnv::FnvHashMap;
use futures::future::BoxFuture;

use crate::{
    ast::Name,
    deferred::{Deferred, Interrupt},
    executor::{ErrorType, FieldError},
    resolver::{FieldResolution, NodeReference, ResolvedValue},
    select::RawSelectionSet,
};

/// Resolves a [`NodeReference`] on first touch.
///
/// Implemented by the per-request node loader; object data only holds the
/// handle so a node-backed value stays lazy until someone reads through it.
pub trait NodeResolveDelegate: Send + Sync {
    /// Starts (or joins) resolution of `reference` for `selections`.
    fn resolve(
        &self,
        reference: &NodeReference,
        selections: &RawSelectionSet,
    ) -> Deferred<Result<EngineObjectData, FieldError>>;
}

type SyncFetchFn = dyn Fn(&str) -> FieldResolution + Send + Sync;

enum Backing {
    /// Concrete per-selection slots; pending slots suspend readers.
    Slots(FnvHashMap<Name, Deferred<FieldResolution>>),

    /// A node reference resolved through the loader on first touch.
    Node {
        reference: NodeReference,
        delegate: Arc<dyn NodeResolveDelegate>,
        selections: RawSelectionSet,
    },

    /// Values computed synchronously on access.
    Sync(Arc<SyncFetchFn>),

    /// An overlay consulted first, falling back to the base for selections
    /// the overlay leaves unset.
    Chained {
        overlay: EngineObjectData,
        base: EngineObjectData,
    },
}

/// A lazy, typed handle onto an object's fields.
///
/// Reading a selection suspends until its value is available; a stored
/// failure is rethrown verbatim on every read (clones of one [`FieldError`]
/// share the same underlying error, see [`FieldError::ptr_eq`]); reading a
/// selection that was never set fails with [`ErrorType::UnsetSelection`].
#[derive(Clone)]
pub struct EngineObjectData {
    inner: Arc<ObjectDataInner>,
}

struct ObjectDataInner {
    type_name: Name,
    backing: Backing,
}

impl fmt::Debug for EngineObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match &self.inner.backing {
            Backing::Slots(m) => format!("slots({})", m.len()),
            Backing::Node { reference, .. } => format!("node({})", reference.id()),
            Backing::Sync(_) => "sync".into(),
            Backing::Chained { .. } => "chained".into(),
        };
        f.debug_struct("EngineObjectData")
            .field("type_name", &self.inner.type_name)
            .field("backing", &backing)
            .finish()
    }
}

impl EngineObjectData {
    /// Builds object data out of already-settled selection results.
    pub fn resolved(
        type_name: impl Into<Name>,
        fields: impl IntoIterator<Item = (Name, FieldResolution)>,
    ) -> Self {
        Self::with_backing(
            type_name,
            Backing::Slots(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Deferred::completed(v)))
                    .collect(),
            ),
        )
    }

    /// Builds object data out of plain values.
    pub fn from_values(
        type_name: impl Into<Name>,
        fields: impl IntoIterator<Item = (Name, ResolvedValue)>,
    ) -> Self {
        Self::resolved(
            type_name,
            fields.into_iter().map(|(k, v)| (k, Ok(v))),
        )
    }

    /// Builds object data over still-pending selection slots.
    pub(crate) fn pending_slots(
        type_name: impl Into<Name>,
        slots: FnvHashMap<Name, Deferred<FieldResolution>>,
    ) -> Self {
        Self::with_backing(type_name, Backing::Slots(slots))
    }

    /// Builds object data whose selections are computed synchronously on
    /// access.
    pub fn sync_proxy(
        type_name: impl Into<Name>,
        fetch: impl Fn(&str) -> FieldResolution + Send + Sync + 'static,
    ) -> Self {
        Self::with_backing(type_name, Backing::Sync(Arc::new(fetch)))
    }

    /// Builds object data backed by a node reference, resolved through
    /// `delegate` on first touch.
    pub(crate) fn node(
        reference: NodeReference,
        delegate: Arc<dyn NodeResolveDelegate>,
        selections: RawSelectionSet,
    ) -> Self {
        Self::with_backing(
            reference.type_name().clone(),
            Backing::Node {
                reference,
                delegate,
                selections,
            },
        )
    }

    /// Chains `overlay` over `base`: reads consult the overlay first and
    /// fall back to the base for unset selections.
    pub fn chained(overlay: EngineObjectData, base: EngineObjectData) -> Self {
        let type_name = base.inner.type_name.clone();
        Self::with_backing(type_name, Backing::Chained { overlay, base })
    }

    fn with_backing(type_name: impl Into<Name>, backing: Backing) -> Self {
        Self {
            inner: Arc::new(ObjectDataInner {
                type_name: type_name.into(),
                backing,
            }),
        }
    }

    /// The object type this data belongs to.
    pub fn type_name(&self) -> &Name {
        &self.inner.type_name
    }

    /// Indicates whether two handles view the same underlying object data.
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reads one selection, suspending while its value is still being
    /// computed. Fails with [`ErrorType::UnsetSelection`] when the selection
    /// was never set.
    pub async fn fetch(&self, selection: &str) -> FieldResolution {
        self.fetch_inner(selection).await
    }

    /// Reads one selection like [`EngineObjectData::fetch`], but yields
    /// [`ResolvedValue::Null`] for unset selections instead of failing.
    pub async fn fetch_or_null(&self, selection: &str) -> FieldResolution {
        match self.fetch_inner(selection).await {
            Err(e) if e.error_type() == ErrorType::UnsetSelection => Ok(ResolvedValue::Null),
            other => other,
        }
    }

    /// Reads through a path of nested object selections.
    pub async fn fetch_path(&self, path: &[Name]) -> FieldResolution {
        let Some((first, rest)) = path.split_first() else {
            return Ok(ResolvedValue::Null);
        };

        let mut value = self.fetch(first).await?;
        for step in rest {
            value = match value {
                ResolvedValue::Object(data) => data.fetch(step).await?,
                ResolvedValue::Null => return Ok(ResolvedValue::Null),
                other => {
                    return Err(FieldError::new(format!(
                        "Cannot traverse \"{step}\" through a non-object value ({other:?})",
                    )));
                }
            };
        }

        Ok(value)
    }

    /// The selections known to be obtainable through this object data.
    pub fn selections(&self) -> Vec<Name> {
        match &self.inner.backing {
            Backing::Slots(slots) => slots.keys().cloned().collect(),
            Backing::Node { selections, .. } => selections
                .fields_for_type(self.inner.type_name.as_str())
                .into_iter()
                .map(|f| f.name)
                .collect(),
            Backing::Sync(_) => Vec::new(),
            Backing::Chained { overlay, base } => {
                let mut out = overlay.selections();
                for name in base.selections() {
                    if !out.contains(&name) {
                        out.push(name);
                    }
                }
                out
            }
        }
    }

    fn unset(&self, selection: &str) -> FieldError {
        FieldError::with_type(
            format!(
                "Selection \"{selection}\" was not set on {}",
                self.inner.type_name,
            ),
            ErrorType::UnsetSelection,
        )
    }

    fn fetch_inner<'a>(&'a self, selection: &'a str) -> BoxFuture<'a, FieldResolution> {
        Box::pin(async move {
            match &self.inner.backing {
                Backing::Slots(slots) => match slots.get(selection) {
                    None => Err(self.unset(selection)),
                    Some(slot) => match slot.value().await {
                        Ok(resolution) => resolution,
                        Err(Interrupt::Failure(f)) => Err(FieldError::with_type(
                            f.to_string(),
                            ErrorType::InternalEngineError,
                        )),
                        Err(Interrupt::Cancelled(r)) => Err(FieldError::cancelled(r)),
                    },
                },
                Backing::Node {
                    reference,
                    delegate,
                    selections,
                } => {
                    let resolved = delegate.resolve(reference, selections);
                    match resolved.value().await {
                        Ok(Ok(data)) => data.fetch_inner(selection).await,
                        Ok(Err(e)) => Err(e),
                        Err(Interrupt::Failure(f)) => Err(FieldError::with_type(
                            f.to_string(),
                            ErrorType::InternalEngineError,
                        )),
                        Err(Interrupt::Cancelled(r)) => Err(FieldError::cancelled(r)),
                    }
                }
                Backing::Sync(fetch) => fetch(selection),
                Backing::Chained { overlay, base } => {
                    match overlay.fetch_inner(selection).await {
                        Err(e) if e.error_type() == ErrorType::UnsetSelection => {
                            base.fetch_inner(selection).await
                        }
                        other => other,
                    }
                }
            }
        })
    }
}
