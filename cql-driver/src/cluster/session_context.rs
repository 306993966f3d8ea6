use arc_swap::ArcSwapOption;

use crate::transport::CqlTransport;

/// State shared between the session and its background tasks.
pub struct SessionContext<T: CqlTransport> {
    pub control_connection_transport: ArcSwapOption<T>,
}

impl<T: CqlTransport> Default for SessionContext<T> {
    fn default() -> Self {
        SessionContext {
            control_connection_transport: ArcSwapOption::empty(),
        }
    }
}
