pub mod calculated;
pub mod context;
pub mod helper_methods;
pub mod lp;
pub mod model;
pub mod precomputation;
pub mod quantile;
pub mod reward_cache;
pub mod scc;
pub mod state_index;
pub mod topological;
pub mod value_iteration;
