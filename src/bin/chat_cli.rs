use anyhow::Result;
use empathic::{
    api::types::PredictResponse,
    transcript::{badge_class, ChatTurn, Role, Transcript},
};
use serde_json::json;
use std::{env, path::PathBuf, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
const SAMPLE: &str =
    "I'm happy for my friend, but deep down I feel a bit jealous and disappointed in myself.";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let server = env::args()
        .nth(1)
        .or_else(|| env::var("EMPATHIC_URL").ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let predict_url = format!("{}/predict", server.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    println!("💬 Empathetic AI Assistant → {predict_url}");
    println!("   commands: /clear  /export [path]  /sample  /quit");

    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/clear", _) => {
                transcript.clear();
                println!("🧹 chat cleared");
                continue;
            }
            ("/export", arg) => {
                if transcript.is_empty() {
                    println!("No messages to export yet.");
                } else {
                    let path = if arg.is_empty() {
                        PathBuf::from(Transcript::export_file_name())
                    } else {
                        PathBuf::from(arg)
                    };
                    match transcript.export_to(&path) {
                        Ok(()) => println!("💾 exported {} turns to {}", transcript.len(), path.display()),
                        Err(err) => eprintln!("{err:#}"),
                    }
                }
                continue;
            }
            ("/sample", _) => {
                transcript.push(ChatTurn::user(SAMPLE));
                print_turn(transcript.turns().last());
                continue;
            }
            _ => {}
        }

        transcript.push(ChatTurn::user(input));
        let reply = send(&client, &predict_url, input).await;
        transcript.push(reply);
        print_turn(transcript.turns().last());
    }

    Ok(())
}

async fn send(client: &reqwest::Client, url: &str, text: &str) -> ChatTurn {
    let resp = match client.post(url).json(&json!({ "text": text })).send().await {
        Ok(resp) => resp,
        Err(err) => return ChatTurn::assistant_error(format!("API Error: {err}")),
    };

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return ChatTurn::assistant_error(format!("[Server Error {}] {body}", status.as_u16()));
    }

    match resp.json::<PredictResponse>().await {
        Ok(data) => ChatTurn::assistant(data.llm_response, data.emotions, data.probs),
        Err(err) => ChatTurn::assistant_error(format!("API Error: {err}")),
    }
}

fn print_turn(turn: Option<&ChatTurn>) {
    let Some(turn) = turn else {
        return;
    };
    let who = match turn.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    println!("\n{who} · {}\n{}", turn.time, turn.content);

    let badges = turn
        .badges()
        .into_iter()
        .map(|(emo, score)| {
            let label = match score {
                Some(s) => format!("{emo} {s:.2}"),
                None => emo.clone(),
            };
            format!("{}[{label}]\x1b[0m", badge_colour(&emo))
        })
        .collect::<Vec<_>>();
    if !badges.is_empty() {
        println!("{}", badges.join(" "));
    }
    println!();
}

/// ANSI colour matching the chat UI's badge palette.
fn badge_colour(emotion: &str) -> &'static str {
    match badge_class(emotion) {
        "badge-joy" => "\x1b[33m",
        "badge-sadness" => "\x1b[34m",
        "badge-anger" => "\x1b[31m",
        "badge-fear" => "\x1b[35m",
        "badge-disgust" => "\x1b[32m",
        "badge-neutral" => "\x1b[37m",
        _ => "\x1b[0m",
    }
}
