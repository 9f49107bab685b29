use std::time::Duration;

use tokio::time::sleep;

use marktforge_core::{DriverError, StepLog};

use crate::session::BrowserSession;

const EMAIL_INPUT: &str = "input[type='email']";
const PASSWORD_INPUT: &str = "input[type='password']";
const IDENTIFIER_NEXT: &[&str] = &["#identifierNext", "#identifierNext button", "#next"];
const PASSWORD_NEXT: &[&str] = &["#passwordNext", "#passwordNext button", "#submit"];

/// Markers Google shows when it wants more than a password. Any of these in
/// place of (or after) the password prompt is a hard, non-retryable stop.
const VERIFICATION_MARKERS: &[&str] = &[
    "verify it's you",
    "verify it\u{2019}s you",
    "2-step verification",
    "verification code",
    "confirm your identity",
    "unusual activity",
    "recaptcha",
    "captcha",
    "tweestapsverificatie",
    "bevestig je identiteit",
];

/// True when the rendered page shows a 2FA/captcha/identity challenge.
pub fn needs_verification(page_text: &str) -> bool {
    let text = page_text.to_lowercase();
    VERIFICATION_MARKERS.iter().any(|m| text.contains(m))
}

/// Drive the Google sign-in form: email, next, password, next. Shared by the
/// registration driver and the account validator, which stops here.
pub async fn sign_in(
    session: &dyn BrowserSession,
    signin_url: &str,
    email: &str,
    password: &str,
    element_wait: Duration,
    log: &mut StepLog,
) -> Result<(), DriverError> {
    log.step(format!("navigating to google sign-in for {}", email));
    session.navigate(signin_url)?;

    if !session.wait_for(EMAIL_INPUT, element_wait) {
        if needs_verification(&session.page_text()) {
            log.step("google challenge before email prompt");
            return Err(DriverError::GoogleVerificationRequired(
                "challenge shown before email prompt".into(),
            ));
        }
        return Err(DriverError::Browser("google email input never appeared".into()));
    }

    session.fill(EMAIL_INPUT, email)?;
    if !session.click_any(IDENTIFIER_NEXT) {
        return Err(DriverError::Browser("google identifier-next button not found".into()));
    }
    log.step("submitted email");

    if !session.wait_for(PASSWORD_INPUT, element_wait) {
        let text = session.page_text();
        if needs_verification(&text) {
            log.step("google demanded verification instead of password");
            return Err(DriverError::GoogleVerificationRequired(
                "challenge shown instead of password prompt".into(),
            ));
        }
        return Err(DriverError::Browser("google password prompt never appeared".into()));
    }

    session.fill(PASSWORD_INPUT, password)?;
    if !session.click_any(PASSWORD_NEXT) {
        return Err(DriverError::Browser("google password-next button not found".into()));
    }
    log.step("submitted password");

    // Give the post-password redirect (or challenge) time to render.
    sleep(Duration::from_secs(2)).await;

    if needs_verification(&session.page_text()) {
        log.step("google demanded verification after password");
        return Err(DriverError::GoogleVerificationRequired(
            "challenge shown after password submit".into(),
        ));
    }

    log.step("google sign-in complete");
    Ok(())
}
