//! Admission control for protected views.

use docdesk_common::Route;

use crate::store::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Render,
    Redirect(Route),
}

/// Protected views render only for an authenticated session; everyone else
/// goes back to the public entry view.
pub fn guard(state: &SessionState) -> Admission {
    if state.is_authenticated() {
        Admission::Render
    } else {
        Admission::Redirect(Route::Login)
    }
}
