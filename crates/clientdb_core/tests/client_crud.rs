use clientdb_core::db::open_db_in_memory;
use clientdb_core::{
    ClientChanges, ClientRepository, ClientSearch, ClientService, ClientValidationError,
    NewClient, RepoError, SqliteClientRepository,
};
use rusqlite::Connection;

#[test]
fn created_client_is_found_by_email_with_no_phones() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let created = repo
        .add_client(&NewClient::new("Maria", "Sidorova", "maria@example.com"))
        .unwrap();

    let found = repo
        .find_clients(&ClientSearch::by_email("maria@example.com"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].client.id, created.id);
    assert_eq!(found[0].client.name, "Maria");
    assert_eq!(found[0].client.surname, "Sidorova");
    assert!(found[0].phones.is_empty());
}

#[test]
fn duplicate_email_is_rejected_and_leaves_one_row() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    repo.add_client(&NewClient::new("A", "B", "a@b.com")).unwrap();
    let err = repo
        .add_client(&NewClient::new("C", "D", "a@b.com").with_phones(["+100"]))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateEmail(ref email) if email == "a@b.com"));

    assert_eq!(count_rows(&conn, "clients"), 1);
    assert_eq!(count_rows(&conn, "telephones"), 0);
}

#[test]
fn add_phone_to_missing_client_fails_without_creating_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let err = repo.add_phone(404, "+79001112233").unwrap_err();
    assert!(matches!(err, RepoError::ClientNotFound(404)));

    assert_eq!(count_rows(&conn, "telephones"), 0);
}

#[test]
fn delete_client_cascades_to_phones() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let created = repo
        .add_client(
            &NewClient::new("Petr", "Petrov", "petr@example.com")
                .with_phones(["+79004445566", "+79007778899"]),
        )
        .unwrap();
    repo.delete_client(created.id).unwrap();

    assert!(repo
        .find_clients(&ClientSearch::by_id(created.id))
        .unwrap()
        .is_empty());
    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM telephones WHERE client = ?1;",
            [created.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
}

#[test]
fn delete_missing_client_reports_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let err = repo.delete_client(7).unwrap_err();
    assert!(matches!(err, RepoError::ClientNotFound(7)));
}

#[test]
fn change_email_only_leaves_other_fields_unchanged() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let created = repo
        .add_client(&NewClient::new("Petr", "Petrov", "petr@example.com").with_phones(["+2"]))
        .unwrap();
    repo.change_client(
        created.id,
        &ClientChanges::default().email("new_petr@example.com"),
    )
    .unwrap();

    let loaded = repo.get_client(created.id).unwrap().unwrap();
    assert_eq!(loaded.client.name, "Petr");
    assert_eq!(loaded.client.surname, "Petrov");
    assert_eq!(loaded.client.email, "new_petr@example.com");
    assert_eq!(loaded.phones, vec!["+2".to_string()]);
}

#[test]
fn add_client_then_find_by_phone_roundtrip() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let created = repo
        .add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com").with_phones(["+1"]))
        .unwrap();
    assert!(created.skipped_phones.is_empty());

    let found = repo.find_clients(&ClientSearch::by_phone("+1")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].client.id, created.id);
    assert!(found[0].phones.contains(&"+1".to_string()));
}

#[test]
fn deleting_unknown_phone_reports_not_found_and_changes_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let owner = repo
        .add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com").with_phones(["+1"]))
        .unwrap();
    let other = repo
        .add_client(&NewClient::new("Petr", "Petrov", "petr@example.com").with_phones(["+2"]))
        .unwrap();

    let err = repo.delete_phone(owner.id, "+999").unwrap_err();
    assert!(matches!(
        err,
        RepoError::PhoneNotFound { client_id, ref number } if client_id == owner.id && number == "+999"
    ));
    // The number exists, but under another client.
    let err = repo.delete_phone(owner.id, "+2").unwrap_err();
    assert!(matches!(err, RepoError::PhoneNotFound { .. }));

    assert_eq!(repo.get_client(owner.id).unwrap().unwrap().phones, vec!["+1"]);
    assert_eq!(repo.get_client(other.id).unwrap().unwrap().phones, vec!["+2"]);
    assert_eq!(count_rows(&conn, "telephones"), 2);
}

#[test]
fn delete_phone_removes_only_matching_number() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let created = repo
        .add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com").with_phones(["+1", "+3"]))
        .unwrap();
    repo.delete_phone(created.id, "+1").unwrap();

    assert_eq!(repo.get_client(created.id).unwrap().unwrap().phones, vec!["+3"]);
}

#[test]
fn add_client_skips_invalid_phones_and_reports_them() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    repo.add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com").with_phones(["+1"]))
        .unwrap();
    let created = repo
        .add_client(
            &NewClient::new("Petr", "Petrov", "petr@example.com")
                .with_phones(["+1", "+2", "  ", "+2"]),
        )
        .unwrap();

    let skipped: Vec<&str> = created
        .skipped_phones
        .iter()
        .map(|skipped| skipped.number.as_str())
        .collect();
    assert_eq!(skipped, vec!["+1", "  ", "+2"]);
    assert!(matches!(
        created.skipped_phones[0].reason,
        RepoError::DuplicateNumber(_)
    ));
    assert!(matches!(
        created.skipped_phones[1].reason,
        RepoError::Validation(ClientValidationError::EmptyPhoneNumber)
    ));

    let loaded = repo.get_client(created.id).unwrap().unwrap();
    assert_eq!(loaded.phones, vec!["+2"]);
}

#[test]
fn invalid_client_input_is_rejected_before_insert() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let err = repo
        .add_client(&NewClient::new("Ivan", "Ivanov", "ivan.example.com"))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidEmailFormat(_)));

    let err = repo
        .add_client(&NewClient::new(" ", "Ivanov", "ivan@example.com"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ClientValidationError::EmptyName)
    ));

    assert_eq!(count_rows(&conn, "clients"), 0);
}

#[test]
fn add_phone_rejects_numbers_owned_by_anyone() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let ivan = repo
        .add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com").with_phones(["+1"]))
        .unwrap();
    let petr = repo
        .add_client(&NewClient::new("Petr", "Petrov", "petr@example.com"))
        .unwrap();

    let err = repo.add_phone(petr.id, "+1").unwrap_err();
    assert!(matches!(err, RepoError::DuplicateNumber(ref number) if number == "+1"));
    let err = repo.add_phone(ivan.id, " +1 ").unwrap_err();
    assert!(matches!(err, RepoError::DuplicateNumber(_)));

    let phone_id = repo.add_phone(ivan.id, "+79000001122").unwrap();
    let phones = repo.list_phones(ivan.id).unwrap();
    assert_eq!(phones.len(), 2);
    assert_eq!(phones[1].id, phone_id);
    assert_eq!(phones[1].number, "+79000001122");
    assert_eq!(phones[1].client_id, ivan.id);
}

#[test]
fn change_client_replaces_clears_or_keeps_phones() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let created = repo
        .add_client(
            &NewClient::new("Petr", "Petrov", "petr@example.com")
                .with_phones(["+79004445566", "+79007778899"]),
        )
        .unwrap();

    repo.change_client(created.id, &ClientChanges::default().name("Pyotr"))
        .unwrap();
    let loaded = repo.get_client(created.id).unwrap().unwrap();
    assert_eq!(loaded.client.name, "Pyotr");
    assert_eq!(loaded.phones.len(), 2);

    repo.change_client(
        created.id,
        &ClientChanges::default().phones(["+79990001122", "+79004445566"]),
    )
    .unwrap();
    let loaded = repo.get_client(created.id).unwrap().unwrap();
    assert_eq!(loaded.phones, vec!["+79990001122", "+79004445566"]);

    repo.change_client(
        created.id,
        &ClientChanges::default().phones(Vec::<String>::new()),
    )
    .unwrap();
    assert!(repo.get_client(created.id).unwrap().unwrap().phones.is_empty());
}

#[test]
fn change_client_phone_replacement_is_all_or_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    repo.add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com").with_phones(["+1"]))
        .unwrap();
    let petr = repo
        .add_client(&NewClient::new("Petr", "Petrov", "petr@example.com").with_phones(["+2"]))
        .unwrap();

    let err = repo
        .change_client(
            petr.id,
            &ClientChanges::default().surname("Petrovsky").phones(["+5", "+1"]),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateNumber(ref number) if number == "+1"));

    let loaded = repo.get_client(petr.id).unwrap().unwrap();
    assert_eq!(loaded.client.surname, "Petrov");
    assert_eq!(loaded.phones, vec!["+2"]);
}

#[test]
fn change_client_email_uniqueness_excludes_self() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let ivan = repo
        .add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com"))
        .unwrap();
    repo.add_client(&NewClient::new("Petr", "Petrov", "petr@example.com"))
        .unwrap();

    let err = repo
        .change_client(ivan.id, &ClientChanges::default().email("petr@example.com"))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateEmail(_)));

    repo.change_client(ivan.id, &ClientChanges::default().email("ivan@example.com"))
        .unwrap();

    let err = repo
        .change_client(ivan.id, &ClientChanges::default().email("broken"))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidEmailFormat(_)));
}

#[test]
fn change_missing_client_reports_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteClientRepository::try_new(&mut conn).unwrap();

    let err = repo
        .change_client(99, &ClientChanges::default().name("Ghost"))
        .unwrap_err();
    assert!(matches!(err, RepoError::ClientNotFound(99)));

    let err = repo
        .change_client(99, &ClientChanges::default())
        .unwrap_err();
    assert!(matches!(err, RepoError::ClientNotFound(99)));
}

#[test]
fn service_replays_reference_walkthrough() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&mut conn).unwrap();
    let mut service = ClientService::new(repo);

    let ivan = service
        .add_client(&NewClient::new("Иван", "Иванов", "ivan@example.com").with_phones(["+79001112233"]))
        .unwrap()
        .id;
    let petr = service
        .add_client(
            &NewClient::new("Петр", "Петров", "petr@example.com")
                .with_phones(["+79004445566", "+79007778899"]),
        )
        .unwrap()
        .id;
    let maria = service
        .add_client(&NewClient::new("Мария", "Сидорова", "maria@example.com"))
        .unwrap()
        .id;

    service.add_phone(ivan, "+79000001122").unwrap();
    service
        .change_client(
            petr,
            &ClientChanges::default()
                .email("new_petr@example.com")
                .phones(["+79990001122"]),
        )
        .unwrap();
    service.delete_phone(ivan, "+79001112233").unwrap();

    let by_name = service
        .find_clients(&ClientSearch::default().name("Иван"))
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].phones, vec!["+79000001122"]);

    let by_phone = service
        .find_clients(&ClientSearch::by_phone("+79990001122"))
        .unwrap();
    assert_eq!(by_phone.len(), 1);
    assert_eq!(by_phone[0].client.email, "new_petr@example.com");

    service.delete_client(maria).unwrap();
    let remaining: Vec<i64> = service
        .list_clients()
        .unwrap()
        .into_iter()
        .map(|record| record.client.id)
        .collect();
    assert_eq!(remaining, vec![ivan, petr]);
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
