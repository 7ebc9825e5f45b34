//! Generation requests.
//!
//! A request arrives from the design-system store as JSON:
//!
//! ```json
//! {
//!   "id": "req-42",
//!   "npm": { "name": "@acme/ui", "version": "2.3.1",
//!            "themesName": "@acme/themes", "themesVersion": "1.0.0" },
//!   "projectName": "Acme UI",
//!   "components": ["Button", "Link"]
//! }
//! ```

pub mod types;
pub mod validation;

pub use types::{remote_key_for, GenerationRequest, PackageDescriptor};
pub use validation::{validate_component_name, validate_package_name, validate_version};
