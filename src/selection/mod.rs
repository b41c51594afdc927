pub mod nsga2;
pub mod selection_strategy;

pub use nsga2::{crowding_distances, sort_nondominated, Nsga2Selection};
pub use selection_strategy::SelectionStrategy;
