fn main() {
    if let Err(err) = sales_report::run() {
        eprintln!("error: {err:#}");
        std::process::exit(sales_report::exit_code(&err));
    }
}
