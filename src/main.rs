use bindle::cli;

fn main() {
  match cli::run() {
    // A failed build exits non-zero; diagnostics were already printed
    Ok(true) => std::process::exit(1),
    Ok(false) => {}
    Err(err) => {
      eprintln!("error: {}", err);
      std::process::exit(1);
    }
  }
}
