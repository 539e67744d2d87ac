//! Scenario-level tests exercising whole algorithms end to end, as opposed
//! to the unit tests co-located with each store.
