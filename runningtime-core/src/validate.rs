use crate::combo_error::ComboErrors;
use crate::imports::*;
use std::fmt::Debug;

pub type ValidationError = anyhow::Error;
pub type ValidationErrors = ComboErrors<ValidationError>;
pub type ValidationResults = Result<(), ValidationErrors>;

///Specify when an object is valid
pub trait ObjState {
    fn validate(&self) -> ValidationResults {
        Ok(())
    }
}

/// Validates every element of `slice`, nesting element errors under their index
pub fn validate_slice<T>(errors: &mut ValidationErrors, slice: &[T], elem_name: &str)
where
    T: ObjState,
{
    for (index, val) in slice.iter().enumerate() {
        if let Err(mut errors_add) = val.validate() {
            errors_add.add_context(anyhow!(
                "{} at index = {} must be valid!",
                elem_name,
                index
            ));
            errors.append(&mut errors_add);
        }
    }
}

pub fn chk_num_gez_fin(errors: &mut ValidationErrors, field_val: f64, field_name: &str) {
    if !(field_val >= 0.0 && field_val.is_finite()) {
        errors.push(anyhow!(
            "{} = {:?} must be a finite positive number!",
            field_name,
            field_val
        ));
    }
}

pub fn chk_num_le<T>(errors: &mut ValidationErrors, field_val: T, bound: T, field_name: &str)
where
    T: Debug + PartialOrd,
{
    if field_val > bound {
        errors.push(anyhow!(
            "{} = {:?} must not exceed {:?}!",
            field_name,
            field_val,
            bound
        ));
    }
}
