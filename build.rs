fn main() {
    // ESP-IDF environment is only needed for firmware builds: the esp32
    // feature on an Xtensa target. Host builds and tests skip it.
    let esp32_feature = std::env::var_os("CARGO_FEATURE_ESP32").is_some();
    let xtensa = std::env::var("TARGET").is_ok_and(|target| target.contains("xtensa"));
    if esp32_feature && xtensa {
        embuild::espidf::sysenv::output();
    }
}
