use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core_error::ClientError;
use crate::core_interpreter::interpreter::{CommandAction, Interpreter};
use crate::core_interpreter::token::{Param, ParamType, Parameter, Token};

use super::client::FtpClient;

pub type SharedClient = Arc<Mutex<FtpClient>>;

/// The operator verbs the grammar engine can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientCommand {
    Login,
    Logout,
    Help,
    ListPath,
    List,
    Put,
    Get,
    Pasv,
    Ascii,
    Binary,
}

/// The full command grammar, in match order. The one-parameter `list`
/// comes before the bare `list` so the more specific shape wins.
fn command_table() -> Vec<(Vec<Token>, ClientCommand)> {
    vec![
        (
            vec![
                Token::Literal("login"),
                Token::Param(Param::new(0, "user", ParamType::String)),
                Token::Param(Param::new(1, "pass", ParamType::String)),
            ],
            ClientCommand::Login,
        ),
        (vec![Token::Literal("help")], ClientCommand::Help),
        (vec![Token::Literal("logout")], ClientCommand::Logout),
        (
            vec![
                Token::Literal("list"),
                Token::Param(Param::new(0, "path", ParamType::Path)),
            ],
            ClientCommand::ListPath,
        ),
        (vec![Token::Literal("list")], ClientCommand::List),
        (
            vec![
                Token::Literal("put"),
                Token::Param(Param::new(0, "path", ParamType::Path)),
            ],
            ClientCommand::Put,
        ),
        (
            vec![
                Token::Literal("get"),
                Token::Param(Param::new(0, "path", ParamType::Path)),
            ],
            ClientCommand::Get,
        ),
        (vec![Token::Literal("pasv")], ClientCommand::Pasv),
        (vec![Token::Literal("ascii")], ClientCommand::Ascii),
        (vec![Token::Literal("binary")], ClientCommand::Binary),
    ]
}

/// Builds the command registry: every operator verb bound to its FTP
/// operation sequence.
pub fn initialize_interpreter() -> Interpreter<SharedClient> {
    let table = command_table();
    let usage = Arc::new(render_usage(&table));

    let mut interpreter = Interpreter::new();
    for (tokens, command) in table {
        interpreter.add_command(tokens, make_action(command, Arc::clone(&usage)));
    }
    interpreter
}

fn make_action(command: ClientCommand, usage: Arc<String>) -> CommandAction<SharedClient> {
    match command {
        ClientCommand::Login => Box::new(|client, pms| Box::pin(cmd_login(client, pms))),
        ClientCommand::Logout => Box::new(|client, _pms| Box::pin(cmd_logout(client))),
        ClientCommand::Help => Box::new(move |_client, _pms| {
            let usage = Arc::clone(&usage);
            Box::pin(async move {
                print!("{}", usage);
                Ok(())
            })
        }),
        ClientCommand::ListPath => Box::new(|client, pms| Box::pin(cmd_list_path(client, pms))),
        ClientCommand::List => Box::new(|client, _pms| Box::pin(cmd_list(client))),
        ClientCommand::Put => Box::new(|client, pms| Box::pin(cmd_put(client, pms))),
        ClientCommand::Get => Box::new(|client, pms| Box::pin(cmd_get(client, pms))),
        ClientCommand::Pasv => Box::new(|client, _pms| Box::pin(cmd_pasv(client))),
        ClientCommand::Ascii => Box::new(|client, _pms| Box::pin(cmd_ascii(client))),
        ClientCommand::Binary => Box::new(|client, _pms| Box::pin(cmd_binary(client))),
    }
}

/// One line per registered pattern, literals verbatim and parameter
/// slots as `<id=name:TYPE>`.
fn render_usage(table: &[(Vec<Token>, ClientCommand)]) -> String {
    let mut usage = String::new();
    for (tokens, _) in table {
        let words: Vec<String> = tokens.iter().map(|token| token.to_string()).collect();
        usage.push_str(&words.join(" "));
        usage.push('\n');
    }
    usage
}

async fn cmd_login(client: SharedClient, pms: Vec<Parameter>) -> Result<(), ClientError> {
    let user = pms[0].get_str()?.to_string();
    let pass = pms[1].get_str()?.to_string();
    client.lock().await.login(&user, &pass).await
}

async fn cmd_logout(client: SharedClient) -> Result<(), ClientError> {
    client.lock().await.logout().await
}

async fn cmd_list_path(client: SharedClient, pms: Vec<Parameter>) -> Result<(), ClientError> {
    let path = pms[0].get_path()?.to_string();
    let mut client = client.lock().await;
    client.pasv().await?;
    client.list(Some(&path)).await
}

async fn cmd_list(client: SharedClient) -> Result<(), ClientError> {
    let mut client = client.lock().await;
    client.pasv().await?;
    client.list(None).await
}

async fn cmd_put(client: SharedClient, pms: Vec<Parameter>) -> Result<(), ClientError> {
    let path = pms[0].get_path()?.to_string();
    let mut client = client.lock().await;
    client.pasv().await?;
    client.stor(&path).await
}

async fn cmd_get(client: SharedClient, pms: Vec<Parameter>) -> Result<(), ClientError> {
    let path = pms[0].get_path()?.to_string();
    let mut client = client.lock().await;
    client.pasv().await?;
    client.retr(&path).await
}

async fn cmd_pasv(client: SharedClient) -> Result<(), ClientError> {
    client.lock().await.pasv().await
}

async fn cmd_ascii(client: SharedClient) -> Result<(), ClientError> {
    client.lock().await.mode_ascii().await
}

async fn cmd_binary(client: SharedClient) -> Result<(), ClientError> {
    client.lock().await.mode_binary().await
}
