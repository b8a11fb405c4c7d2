pub mod details;
pub mod template;

pub use details::{SwapScriptDetails, swap_script_details};
pub use template::{
    RefundKey, SwapScriptParams, SwapScriptType, pk_hash_swap_script, pk_swap_script,
};
