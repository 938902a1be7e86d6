//! Sequential walkthrough of every client operation, for manual verification.

use clientdb_core::{
    ClientChanges, ClientRecord, ClientSearch, ClientService, NewClient, RepoResult,
    SqliteClientRepository,
};
use rusqlite::Connection;
use std::error::Error;

pub fn run(conn: &mut Connection) -> Result<(), Box<dyn Error>> {
    let mut service = ClientService::new(SqliteClientRepository::try_new(conn)?);

    println!("1. Adding clients...");
    let ivan = service.add_client(
        &NewClient::new("Иван", "Иванов", "ivan@example.com").with_phones(["+79001112233"]),
    )?;
    let petr = service.add_client(
        &NewClient::new("Петр", "Петров", "petr@example.com")
            .with_phones(["+79004445566", "+79007778899"]),
    )?;
    let maria = service.add_client(&NewClient::new("Мария", "Сидорова", "maria@example.com"))?;
    for created in [&ivan, &petr, &maria] {
        for skipped in &created.skipped_phones {
            println!("   skipped phone {}: {}", skipped.number, skipped.reason);
        }
    }
    println!("   added clients: {}, {}, {}", ivan.id, petr.id, maria.id);

    println!("2. Adding another phone for client {}...", ivan.id);
    service.add_phone(ivan.id, "+79000001122")?;

    println!("3. Changing email and phones of client {}...", petr.id);
    service.change_client(
        petr.id,
        &ClientChanges::default()
            .email("new_petr@example.com")
            .phones(["+79990001122"]),
    )?;

    println!("4. Deleting one phone of client {}...", ivan.id);
    service.delete_phone(ivan.id, "+79001112233")?;

    println!("5. Searching by name `Иван`...");
    print_found(service.find_clients(&ClientSearch::default().name("Иван")))?;

    println!("6. Searching by phone `+79990001122`...");
    print_found(service.find_clients(&ClientSearch::by_phone("+79990001122")))?;

    println!("7. Deleting client {}...", maria.id);
    service.delete_client(maria.id)?;

    println!("8. Remaining clients:");
    print_found(service.list_clients())?;

    Ok(())
}

fn print_found(result: RepoResult<Vec<ClientRecord>>) -> Result<(), Box<dyn Error>> {
    for record in result? {
        println!("   {}", serde_json::to_string(&record)?);
    }
    Ok(())
}
