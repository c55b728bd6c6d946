//! BDD scenarios for the Homeflow workflow engine.
//!
//! ```bash
//! # Run all scenarios
//! cargo test --test bdd
//!
//! # Run one feature
//! cargo test --test bdd -- --name "Buyer onboarding"
//! ```
//!
//! The library half holds the fixtures shared by the step definitions.

/// Session data fixtures
pub mod fixtures {
    use homeflow_core::{ListingDetails, RegistrationForm};

    /// A valid registration for `email`
    pub fn registration(email: &str) -> RegistrationForm {
        RegistrationForm {
            name: "Jordan Avery".to_string(),
            email: email.to_string(),
            phone: "5550142857".to_string(),
            password: "correct-horse-42".to_string(),
            confirm_password: "correct-horse-42".to_string(),
        }
    }

    /// A valid listing in `city`
    pub fn listing(city: &str, price_cents: u64) -> ListingDetails {
        ListingDetails {
            address: "12 Mill Lane".to_string(),
            city: city.to_string(),
            price_cents,
            property_type: "house".to_string(),
            bedrooms: 3,
            bathrooms: 1,
            area_sqft: 1_100,
            description: "Stone cottage near the river".to_string(),
        }
    }

    /// Content type guessed from a file name
    pub fn content_type(file_name: &str) -> &'static str {
        match file_name.rsplit('.').next() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("pdf") => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}
