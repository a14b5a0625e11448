use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};

use super::error::{MongoDaoError, MongoResult};

const APP_NAME: &str = "club-courts-back";
/// Server selection bound applied when the URI sets none.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Client options with the service's defaults filled in.
fn client_options(options: &ClientOptions) -> ClientOptions {
    let mut options = options.clone();
    options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
    options
        .server_selection_timeout
        .get_or_insert(SERVER_SELECTION_TIMEOUT);
    options
}

/// Build a client for `database_name` and check it with a single ping.
///
/// Retrying is left to the caller.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(client_options(options))
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|source| MongoDaoError::InitialPing {
            database: database_name.to_owned(),
            source,
        })?;

    Ok((client, database))
}
