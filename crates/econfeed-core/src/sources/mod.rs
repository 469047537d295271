//! Agency implementations of [`SeriesProvider`](crate::client::SeriesProvider).
//!
//! | Source | Provider | Series id |
//! |--------|----------|-----------|
//! | `census` | [`Census`] | `dataset:variable[:predicate]` |
//! | `fred` | [`Fred`] | `series` |
//! | `worldbank` | [`WorldBank`] | `country:indicator` |
//! | `bls` | [`Bls`] | `series` |
//! | `bea` | [`Bea`] | `dataset:table[:line[:frequency]]` |
//! | `eurostat` | [`Eurostat`] | `dataset:geo[:dim=code,...]` |
//! | `imf` | [`Imf`] | `dataset:key` |
//! | `ecb` | [`Ecb`] | `flow:key` |
//! | `oecd` | [`Oecd`] | `dataflow:key` |
//! | `comtrade` | [`Comtrade`] | `reporter:partner:flow[:commodity]` |

mod bea;
mod bls;
mod census;
mod comtrade;
mod eurostat;
mod fred;
mod imf;
mod sdmx;
mod worldbank;

use std::sync::Arc;

pub use bea::Bea;
pub use bls::Bls;
pub use census::Census;
pub use comtrade::Comtrade;
pub use eurostat::Eurostat;
pub use fred::Fred;
pub use imf::Imf;
pub use sdmx::{Ecb, Oecd};
pub use worldbank::WorldBank;

use crate::cache::CacheStore;
use crate::client::ProviderClient;
use crate::data_source::SourceClient;
use crate::http_client::HttpClient;
use crate::{IngestConfig, SourceId};

pub type CensusClient = ProviderClient<Census>;
pub type FredClient = ProviderClient<Fred>;
pub type WorldBankClient = ProviderClient<WorldBank>;
pub type BlsClient = ProviderClient<Bls>;
pub type BeaClient = ProviderClient<Bea>;
pub type EurostatClient = ProviderClient<Eurostat>;
pub type ImfClient = ProviderClient<Imf>;
pub type EcbClient = ProviderClient<Ecb>;
pub type OecdClient = ProviderClient<Oecd>;
pub type ComtradeClient = ProviderClient<Comtrade>;

/// Build the configured client for `source`.
pub fn client_for(
    source: SourceId,
    http_client: Arc<dyn HttpClient>,
    cache: CacheStore,
    config: &IngestConfig,
) -> Arc<dyn SourceClient> {
    match source {
        SourceId::Census => Arc::new(CensusClient::from_config(Census, http_client, cache, config)),
        SourceId::Fred => Arc::new(FredClient::from_config(Fred, http_client, cache, config)),
        SourceId::WorldBank => Arc::new(WorldBankClient::from_config(
            WorldBank,
            http_client,
            cache,
            config,
        )),
        SourceId::Bls => Arc::new(BlsClient::from_config(Bls, http_client, cache, config)),
        SourceId::Bea => Arc::new(BeaClient::from_config(Bea, http_client, cache, config)),
        SourceId::Eurostat => Arc::new(EurostatClient::from_config(
            Eurostat,
            http_client,
            cache,
            config,
        )),
        SourceId::Imf => Arc::new(ImfClient::from_config(Imf, http_client, cache, config)),
        SourceId::Ecb => Arc::new(EcbClient::from_config(Ecb, http_client, cache, config)),
        SourceId::Oecd => Arc::new(OecdClient::from_config(Oecd, http_client, cache, config)),
        SourceId::Comtrade => Arc::new(ComtradeClient::from_config(
            Comtrade,
            http_client,
            cache,
            config,
        )),
    }
}
