use std::borrow::Cow;
use std::sync::Arc;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Provider-specific query symbol (e.g. `2330.TW`), built per fetch
pub type ProviderSymbol = Arc<str>;
