//! In-process implementations.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{DirectError, Operation};

/// An in-process implementation of an operation.
pub type DirectService<Req, Resp> = dyn Operation<Req, Resp, Error = DirectError>;

type Factory<Req, Resp> =
    Box<dyn Fn() -> Result<Arc<DirectService<Req, Resp>>, DirectError> + Send + Sync>;

/// Lazily constructs and memoizes an in-process implementation.
///
/// The factory runs on first use. A failed construction is not remembered;
/// the next call runs the factory again.
///
/// ```rust
/// use agrilink_integration::{DirectError, DirectProvider, DirectService, Operation};
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct GrowingDegreeDays;
///
/// #[async_trait]
/// impl Operation<(f64, f64), f64> for GrowingDegreeDays {
///     type Error = DirectError;
///
///     async fn call(&self, temps: &(f64, f64)) -> Result<f64, DirectError> {
///         let (max, min) = *temps;
///         Ok(((max + min) / 2.0 - 10.0).max(0.0))
///     }
/// }
///
/// let provider = DirectProvider::new("gdd", || {
///     Ok(Arc::new(GrowingDegreeDays) as Arc<DirectService<(f64, f64), f64>>)
/// });
/// assert!(!provider.is_constructed());
///
/// # tokio_test::block_on(async {
/// let gdd = provider.get().unwrap().call(&(30.0, 14.0)).await.unwrap();
/// assert_eq!(gdd, 12.0);
/// assert!(provider.is_constructed());
/// # });
/// ```
pub struct DirectProvider<Req, Resp> {
    name: String,
    factory: Factory<Req, Resp>,
    instance: OnceCell<Arc<DirectService<Req, Resp>>>,
}

impl<Req, Resp> DirectProvider<Req, Resp>
where
    Req: Sync + 'static,
    Resp: 'static,
{
    /// Create a provider from a factory.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<DirectService<Req, Resp>>, DirectError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
            instance: OnceCell::new(),
        }
    }

    /// Create a provider around an already-built implementation.
    pub fn ready(name: impl Into<String>, service: Arc<DirectService<Req, Resp>>) -> Self {
        let instance = OnceCell::new();
        let _ = instance.set(service.clone());
        Self {
            name: name.into(),
            factory: Box::new(move || Ok(service.clone())),
            instance,
        }
    }

    /// Create a provider whose implementation is not present in this process.
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(name, move || Err(DirectError::not_available(reason.clone())))
    }

    /// Dependency name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the implementation, constructing it on first use.
    pub fn get(&self) -> Result<&Arc<DirectService<Req, Resp>>, DirectError> {
        self.instance.get_or_try_init(|| {
            debug!(service = %self.name, "Constructing direct implementation");
            (self.factory)().inspect_err(|e| {
                warn!(service = %self.name, error = %e, "Direct implementation unavailable");
            })
        })
    }

    /// Whether the implementation has been constructed.
    pub fn is_constructed(&self) -> bool {
        self.instance.get().is_some()
    }
}

impl<Req, Resp> std::fmt::Debug for DirectProvider<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectProvider")
            .field("name", &self.name)
            .field("constructed", &self.instance.get().is_some())
            .finish()
    }
}
