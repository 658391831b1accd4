use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Upper-cased asset ticker as used in cache keys and requests (e.g. "BTC")
pub type Symbol = String;
