//! Shape classification and code planning

mod planner;
mod shapes;

pub use planner::{
    classify, plan_procedure, plan_procedures, render_method_parameters, render_parameter_list,
};
pub use shapes::*;
