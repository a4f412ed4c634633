//! Seat sharing for family and company subscriptions.
//!
//! A payer buys a subscription whose plan is linked to a dependent plan.
//! The engine hands out one redeemable [`FamilyRequest`] per seat, turns a
//! redeemed request into a dependent subscription, carries members over
//! when the payer renews and keeps dependents in step with their payer.

mod context;
pub mod events;
pub mod items;
pub mod memory;
pub mod pg;
pub mod provisioning;
pub mod service;
pub mod store;

mod services {
    pub(crate) mod count;
    pub(crate) mod donation;
    pub(crate) mod generator;
    pub(crate) mod lifecycle;
    pub(crate) mod renewal;
}

#[cfg(test)]
mod testing;

pub use db::models::{plan_link::PlanLink, request::FamilyRequest, subscription::Subscription};
pub use events::{EventBus, FamilyEvent, LogEventBus, MemoryEventBus};
pub use items::{PaymentItemConfig, PaymentItemsConfig};
pub use memory::MemoryBackend;
pub use pg::PgBackend;
pub use provisioning::Provisioning;
pub use service::FamilyService;
pub use services::{
    donation::{Donation, DonationLink},
    lifecycle::ShortenOutcome,
    renewal::RenewalOutcome,
};
pub use store::Backend;
