use chrono::NaiveDateTime;
use common::env_config::FamilyConfig;

use crate::events::FamilyEvent;

/// State of one engine operation: settings, the instant it runs at and the
/// events it will publish once committed.
pub(crate) struct Ctx<'a> {
    pub config: &'a FamilyConfig,
    pub now: NaiveDateTime,
    pub events: Vec<FamilyEvent>,
}

impl<'a> Ctx<'a> {
    pub fn new(config: &'a FamilyConfig, now: NaiveDateTime) -> Self {
        Ctx {
            config,
            now,
            events: Vec::new(),
        }
    }
}
