mod geolocation;
mod http;
mod kv;

use std::sync::Arc;

pub use self::geolocation::{GeoReading, GeolocationError, GeolocationProvider, NoGeolocation};
#[cfg(feature = "reqwest-transport")]
pub use self::http::ReqwestTransport;
pub use self::http::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartForm,
    MAX_TIMEOUT,
};
pub use self::kv::{FileTokenStore, KvError, MemoryTokenStore, TokenStore};

/// The external services a shell hands to the core.
#[derive(Clone)]
pub struct Capabilities {
    pub http: Arc<dyn HttpTransport>,
    pub tokens: Arc<dyn TokenStore>,
    pub geolocation: Arc<dyn GeolocationProvider>,
}

impl Capabilities {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenStore>,
        geolocation: Arc<dyn GeolocationProvider>,
    ) -> Self {
        Self {
            http,
            tokens,
            geolocation,
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
