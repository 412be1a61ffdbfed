// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::ObserveArgs;
use crate::Outcome;

crate::utils::define_fn_wrapper!(Classify<T, E>(Fn(result: &Result<T, E>) -> Outcome));
crate::utils::define_fn_wrapper!(Observe(Fn(args: ObserveArgs)));

impl<T, E> Classify<T, E> {
    /// `Ok` is a success, `Err` is a failure.
    pub(crate) fn by_result() -> Self {
        Self::new(|result: &Result<T, E>| if result.is_ok() { Outcome::Success } else { Outcome::Failure })
    }
}
