//! Support page route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::api::{Envelope, SupportTicket, User};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, PageContext};
use crate::services::validation::{self, non_blank};
use crate::services::{FieldErrors, Toast};
use crate::state::AppState;

use super::backend;

/// Support form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupportForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub order_number: String,
}

impl SupportForm {
    fn for_user(user: Option<&User>) -> Self {
        user.map_or_else(Self::default, |user| Self {
            name: user.display_name(),
            email: user.email.clone(),
            ..Self::default()
        })
    }

    fn validate(&self) -> std::result::Result<SupportTicket, FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::require(&mut errors, "name", &self.name, "Name");
        validation::require(&mut errors, "email", &self.email, "Email");
        validation::email(&mut errors, "email", &self.email);
        validation::require(&mut errors, "subject", &self.subject, "Subject");
        validation::require(&mut errors, "message", &self.message, "Message");
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(SupportTicket {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
            order_number: non_blank(&self.order_number),
        })
    }
}

/// Support page template.
#[derive(Template, WebTemplate)]
#[template(path = "support/show.html")]
pub struct SupportTemplate {
    pub ctx: PageContext,
    pub form: SupportForm,
    pub errors: FieldErrors,
}

/// Display the support form, prefilled for signed-in users.
#[instrument(skip_all)]
pub async fn show(OptionalAuth(user): OptionalAuth, ctx: PageContext) -> SupportTemplate {
    SupportTemplate {
        ctx,
        form: SupportForm::for_user(user.as_ref()),
        errors: FieldErrors::new(),
    }
}

/// Open a support ticket.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<SupportForm>,
) -> Result<Response> {
    let errors = match form.validate() {
        Ok(ticket) => {
            match backend(&state, &session)
                .create_support_ticket(&ticket)
                .await
                .and_then(Envelope::into_ack)
            {
                Ok(_) => {
                    info!(subject = %ticket.subject, "Support ticket opened");
                    state
                        .notifications()
                        .push(
                            &session,
                            Toast::success("Thanks! Our team will get back to you by email."),
                        )
                        .await;
                    return Ok(Redirect::to("/support").into_response());
                }
                Err(e) => {
                    warn!(error = %e, "Support ticket failed");
                    state
                        .notifications()
                        .push(&session, Toast::error(e.user_message()))
                        .await;
                    FieldErrors::new()
                }
            }
        }
        Err(errors) => errors,
    };

    let ctx = PageContext::build(&state, &session, &nonce, "/support").await;
    Ok(SupportTemplate { ctx, form, errors }.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_needs_every_field_but_the_order_number() {
        let errors = SupportForm::default().validate().err().unwrap_or_default();
        assert_eq!(
            errors.keys().copied().collect::<Vec<_>>(),
            vec!["email", "message", "name", "subject"]
        );

        let form = SupportForm {
            name: "An".into(),
            email: "an@example.com".into(),
            subject: "Late delivery".into(),
            message: "Where is my kettle?".into(),
            order_number: "  ".into(),
        };
        let ticket = form.validate().ok();
        assert!(ticket.is_some_and(|t| t.order_number.is_none()));
    }
}
