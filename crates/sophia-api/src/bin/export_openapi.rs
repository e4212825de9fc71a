// Export the auth OpenAPI specification as JSON
//
// Usage: cargo run --bin export-openapi > docs/auth-openapi.json
//
// Generates the same document served at /api/auth/open-api/generate-schema
// without starting the server.

use sophia_api::openapi::AuthApiDoc;

fn main() {
    match AuthApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
