fn main() {
    // Only run the ESP-IDF build system for ESP-IDF targets (xtensa-esp32s3-espidf etc.)
    // Build scripts run on the host, so we check the TARGET env var
    if let Ok(target) = std::env::var("TARGET") {
        if target.ends_with("-espidf") {
            embuild::espidf::sysenv::output();
        }
    }
}
