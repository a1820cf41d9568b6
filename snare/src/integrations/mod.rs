pub mod dedupe;
pub mod event_filters;
pub mod linked_errors;
pub mod third_party;

pub use dedupe::Dedupe;
pub use event_filters::{EventFilters, EventFiltersOptions};
pub use linked_errors::LinkedErrors;
pub use third_party::{ThirdPartyBehaviour, ThirdPartyErrorsFilter, ThirdPartyErrorsFilterOptions};
