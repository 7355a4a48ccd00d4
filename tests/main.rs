/*!
 * Test suite entry point.
 *
 * Unit tests exercise individual modules through the public API;
 * integration tests drive several modules together the way the
 * application does.
 */

pub mod common;

mod unit {
    pub mod config_tests;
    pub mod document_tests;
    pub mod glossary_tests;
    pub mod language_tests;
    pub mod provider_tests;
}

mod integration {
    pub mod app_tests;
    pub mod pipeline_tests;
    pub mod resume_tests;
}
