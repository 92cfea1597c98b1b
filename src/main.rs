fn main() {
    if let Err(e) = counter_dashboard_lib::run() {
        eprintln!("counter-dashboard: {e:#}");
        std::process::exit(1);
    }
}
