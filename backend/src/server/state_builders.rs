//! Builds the gateway and its service from settings.

use std::sync::Arc;

use chrono::{Offset, Utc};
use mockable::{Clock, DefaultClock};
use tracing::warn;

use click_recorder::config::DsqlSettings;
use click_recorder::domain::ports::{PoolProfile, TokenIssuer};
use click_recorder::domain::{ClickService, Error};
use click_recorder::inbound::gateway::ClickGateway;
use click_recorder::outbound::persistence::pool_context;

/// Build the request gateway.
///
/// Incomplete settings do not stop the server. The configuration error is
/// captured and returned by every record and list call instead.
pub fn build_gateway(
    settings: Result<DsqlSettings, Error>,
    issuer: Arc<dyn TokenIssuer>,
) -> ClickGateway {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            warn!(error = %err, "DSQL settings could not be loaded");
            return ClickGateway::new(Err(err), "", Utc.fix(), clock);
        }
    };

    let display_offset = settings.display_offset().unwrap_or_else(|err| {
        warn!(error = %err, "falling back to UTC for display timestamps");
        Utc.fix()
    });
    let cluster_label = settings.cluster_label().unwrap_or_default();
    let service = pool_context(&settings, issuer, PoolProfile::serverless())
        .map(|pools| {
            Arc::new(ClickService::new(
                Arc::new(pools),
                Arc::clone(&clock),
                settings.request_timeout(),
            ))
        })
        .inspect_err(|err| warn!(error = %err, "click service unavailable until configured"));

    ClickGateway::new(service, cluster_label, display_offset, clock)
}
