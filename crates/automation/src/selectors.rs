//! Target-site selectors. Marktplaats serves Dutch or English depending on
//! locale, so every text probe carries both variants.

/// Structural candidates for the site's login control.
pub const LOGIN_LINK_SELECTORS: &[&str] = &[
    "a[href*='/identity/v2/login']",
    "a[href*='login']",
    "[data-role='login']",
    "#login",
    "button[data-testid='login']",
];

/// Visible-text fallbacks for the login control (lowercase).
pub const LOGIN_TEXT_VARIANTS: &[&str] = &["inloggen", "aanmelden", "log in", "sign in"];

/// Structural candidates for the "continue with Google" control.
pub const GOOGLE_BUTTON_SELECTORS: &[&str] = &[
    "button[data-provider='google']",
    "[data-testid='google-login']",
    "a[href*='accounts.google.com']",
    "#google-signin-button",
];

/// Visible-text fallbacks for the Google button (lowercase).
pub const GOOGLE_TEXT_VARIANTS: &[&str] = &[
    "doorgaan met google",
    "ga verder met google",
    "inloggen met google",
    "continue with google",
    "sign in with google",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_variants_cover_both_languages() {
        // Dutch and English must both be present for each text probe.
        assert!(LOGIN_TEXT_VARIANTS.contains(&"inloggen"));
        assert!(LOGIN_TEXT_VARIANTS.contains(&"log in"));
        assert!(GOOGLE_TEXT_VARIANTS.contains(&"doorgaan met google"));
        assert!(GOOGLE_TEXT_VARIANTS.contains(&"continue with google"));
    }

    #[test]
    fn text_variants_are_lowercase() {
        for variant in LOGIN_TEXT_VARIANTS.iter().chain(GOOGLE_TEXT_VARIANTS) {
            assert_eq!(*variant, variant.to_lowercase());
        }
    }
}
