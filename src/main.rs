use clap::Parser;
use log::debug;
use std::io::Write;
use tokio::sync::mpsc;

use ollama_send::{
  render_response, report_failure, send_request_with, ClientConfig,
  OllamaClient, TokenData, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEMO_PROMPT
};

/// Send a prompt to a local Ollama server and print the reply
#[derive(Parser, Debug)]
#[command(name = "ollama-send", version, about)]
struct Cli
{   /// Prompt text
    #[arg(default_value = DEMO_PROMPT)]
    prompt: String

  , /// Generate endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String

  , /// Model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String

  , /// Request timeout in seconds (none by default)
    #[arg(long)]
    timeout_secs: Option<u64>

  , /// Print tokens as they arrive
    #[arg(long)]
    stream: bool

  , /// Earlier conversation line, repeatable (with --stream)
    #[arg(long = "history", value_name = "LINE", requires = "stream")]
    history: Vec<String>

  , /// Log request and response bodies at debug level
    #[arg(short, long)]
    verbose: bool
}

#[tokio::main]
async fn main()
{   env_logger::init();
    let cli = Cli::parse();
    debug!("CLI arguments: {:?}", cli);

    let config = ClientConfig
    {   endpoint: cli.endpoint
      , model: cli.model
      , timeout_secs: cli.timeout_secs
      , verbose: cli.verbose
    };

    let client = match OllamaClient::new(config)
    {   Ok(client) => client
      , Err(e) => {
          report_failure(&e);
          return;
        }
    };

    if cli.stream
    {   stream_answer(&client, &cli.prompt, &cli.history).await;
        return;
    }

    if let Some(result) = send_request_with(&client, &cli.prompt).await
    {   match render_response(&result)
        {   Ok(text) => println!("{}", text)
          , Err(e) => report_failure(&e)
        }
    }
}

async fn stream_answer(
  client: &OllamaClient
, prompt: &str
, history: &[String]
)
{   let (tx, mut rx) = mpsc::unbounded_channel::<TokenData>();

    let printer = tokio::spawn(async move {
      let mut stdout = std::io::stdout();
      while let Some(token) = rx.recv().await
      {   let _ = write!(stdout, "{}", token.token);
          let _ = stdout.flush();
      }
      let _ = writeln!(stdout);
    });

    let result = if history.is_empty()
    {   client.generate_stream(prompt, tx).await
    } else
    {   client.ask(prompt, history, tx).await
    };

    let _ = printer.await;

    match result
    {   Ok(count) => debug!("Received {} tokens", count)
      , Err(e) => report_failure(&e)
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn no_arguments_sends_demo_prompt()
    {   let cli = Cli::try_parse_from(["ollama-send"]).unwrap();
        assert_eq!(cli.prompt, "Hello, how are you?");
        assert_eq!(cli.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cli.model, DEFAULT_MODEL);
        assert!(!cli.stream);
    }

    #[test]
    fn history_requires_stream()
    {   let err = Cli::try_parse_from([
          "ollama-send", "--history", "You: hi", "next"
        ]);
        assert!(err.is_err());

        let cli = Cli::try_parse_from([
          "ollama-send", "--stream",
          "--history", "You: hi", "--history", "Bot: hello", "next"
        ]).unwrap();
        assert_eq!(cli.history, vec!["You: hi", "Bot: hello"]);
        assert_eq!(cli.prompt, "next");
    }
}
