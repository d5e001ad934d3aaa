use bytes::Bytes;
#[cfg(test)]
use unimock::unimock;

/// Owner-side collaborator of a [`StreamRunner`](crate::StreamRunner).
///
/// Supplies the request parameters, answers the runner's liveness queries,
/// and receives progress notifications. Callbacks are invoked from the
/// runner's background task, strictly in event order; implementations should
/// return quickly.
#[cfg_attr(test, unimock(api = StreamConsumerMock))]
pub trait StreamConsumer: Send + Sync + 'static {
    /// Endpoint to connect to, including any resumption parameters.
    fn url(&self) -> String;

    /// Opaque value for the `Auth` request header.
    fn auth_header(&self) -> String;

    /// Value for the `User-Agent` request header.
    fn user_agent(&self) -> String;

    /// Strict liveness query, checked before starting or continuing the
    /// reconnect loop.
    fn wants_stream(&self) -> bool;

    /// Lenient liveness query, checked before each line while a stream is
    /// open. Weaker than [`wants_stream`](Self::wants_stream): it keeps an
    /// already-open stream draining during a soft stop.
    fn is_active(&self) -> bool;

    /// A connection reached the streaming state.
    fn on_connect(&self);

    /// One non-empty line, delivered verbatim.
    fn on_data(&self, line: Bytes);

    /// A recoverable failure; the runner will retry.
    fn on_warning(&self, message: &str);

    /// A terminal failure; the loop stops after this.
    fn on_error(&self, message: &str);

    /// The loop has exited.
    fn on_disconnect(&self);
}
