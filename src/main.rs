fn main() {
    if let Err(err) = pivot_workbench::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
