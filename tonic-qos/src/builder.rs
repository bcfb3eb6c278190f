//! Client builder for the QoS client.
//!
//! Provides a fluent API for configuring and building a [`QosClient`].

use std::sync::Arc;

use tonic::transport::Channel;

use crate::client::QosClient;
use crate::config::{CallOption, Qos};
use crate::gate::Allower;
use crate::interceptor::{
    Interceptor, InterceptorChain, UnaryClientInterceptorConfig, unary_client_interceptor,
};
use crate::transport::unary_func;

/// Builder for creating a [`QosClient`].
///
/// # Example
///
/// ```ignore
/// use tonic_qos::{ClientBuilder, Qos};
///
/// let client = ClientBuilder::new(channel)
///     .circuit_breaker(breaker)
///     .qos(&Qos { retry_attempts: 3, ..Default::default() })
///     .build();
/// ```
pub struct ClientBuilder {
    /// Channel the transport dispatches on.
    channel: Channel,
    /// Configuration of the retry, breaker and metadata interceptors.
    config: UnaryClientInterceptorConfig,
    /// Interceptors running after the built-in ones.
    interceptors: Vec<Arc<dyn Interceptor>>,
    /// Options applied to every call.
    default_options: Vec<CallOption>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("interceptor_count", &self.interceptors.len())
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Create a new ClientBuilder dispatching on `channel`.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            config: UnaryClientInterceptorConfig::default(),
            interceptors: Vec::new(),
            default_options: Vec::new(),
        }
    }

    /// Gate calls that opt in through `allower`.
    ///
    /// Without a gate the circuit breaker interceptor passes every call
    /// through.
    pub fn circuit_breaker<A>(mut self, allower: A) -> Self
    where
        A: Allower + 'static,
    {
        self.config = self.config.with_circuit_breaker_interceptor(allower);
        self
    }

    /// Add an interceptor running inside the built-in ones, right before
    /// the transport.
    ///
    /// Interceptors are applied in the order they're added.
    pub fn interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: Interceptor + 'static,
    {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Add options applied to every call, before the per-call options.
    pub fn default_options(mut self, options: impl IntoIterator<Item = CallOption>) -> Self {
        self.default_options.extend(options);
        self
    }

    /// Apply `qos` to every call.
    ///
    /// Only the options are applied; a single-attempt timeout still has to
    /// come from [`Qos::context`].
    pub fn qos(self, qos: &Qos) -> Self {
        self.default_options(qos.call_options())
    }

    /// Build the client.
    pub fn build(self) -> QosClient {
        let mut chain: InterceptorChain = unary_client_interceptor(self.config);
        for interceptor in self.interceptors {
            chain.push(interceptor);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(interceptors = chain.len(), "built qos client");

        QosClient::new(chain.wrap_unary(unary_func(self.channel)), self.default_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::UnaryFunc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl Interceptor for Counting {
        fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
            self.0.fetch_add(1, Ordering::SeqCst);
            next
        }
    }

    fn channel() -> Channel {
        Channel::from_static("http://127.0.0.1:1").connect_lazy()
    }

    #[tokio::test]
    async fn test_builder_installs_extra_interceptors() {
        let wrapped = Arc::new(AtomicUsize::new(0));
        let _client = ClientBuilder::new(channel())
            .interceptor(Counting(wrapped.clone()))
            .interceptor(Counting(wrapped.clone()))
            .build();
        assert_eq!(wrapped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_builder_qos_sets_default_options() {
        let qos = Qos {
            circuit_breaker_enabled: true,
            ..Default::default()
        };
        let client = ClientBuilder::new(channel()).qos(&qos).build();
        assert_eq!(client.default_options().len(), qos.call_options().len());
    }
}
