fn print_help() {
    println!(
        "novatrek-clipper {}\n\nUsage:\n  novatrek-clipper [flags]\n\nRuns the NovaTrek capture companion and its browser bridge.\n\nFlags:\n  -h, --help     Show help\n  -V, --version  Show version",
        env!("CARGO_PKG_VERSION")
    );
}

#[tokio::main]
async fn main() {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return;
            }
            "--version" | "-V" => {
                println!("novatrek-clipper {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            other => {
                eprintln!("Unknown flag: {other}. Use --help for usage.");
                std::process::exit(1);
            }
        }
    }

    if let Err(err) = novatrek_clipper::run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
