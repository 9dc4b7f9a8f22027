// Entrypoint for the CLI application.
// - Keeps `main` small: build the client and the archive, take the
//   one-shot connectivity snapshot, then dispatch either the single
//   command-line token or the interactive prompt loop.
// - The transport cache does not outlive the session: it is cleared on
//   every normal exit path.

use comicstash_cli::{api::ComicClient, archive::Archive, ui::App};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let client = ComicClient::from_env()?;
    let archive = Archive::from_env()?;
    let session = client.probe();
    let mut app = App::new(client, archive, session);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() > 1 {
        println!("Bad args -> {args:?}");
    } else if let Some(token) = args.first() {
        app.exec(token)?;
    } else {
        app.run_prompt()?;
    }

    app.clear_cache()?;
    Ok(())
}
