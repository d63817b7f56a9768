diesel::table! {
    audit_log (id) {
        id -> Integer,
        occurred_at -> Timestamp,
        user_id -> Nullable<Text>,
        action -> Text,
        detail -> Text,
    }
}

diesel::table! {
    direct_messages (id) {
        id -> Integer,
        sender_id -> Text,
        receiver_id -> Text,
        body -> Text,
        sent_at -> Timestamp,
        is_read -> Bool,
    }
}

diesel::table! {
    documents (id) {
        id -> Integer,
        task_id -> Integer,
        filename -> Text,
        storage_key -> Text,
        revision_of -> Nullable<Integer>,
        notes -> Nullable<Text>,
        uploaded_at -> Timestamp,
    }
}

diesel::table! {
    project_members (project_id, user_id) {
        project_id -> Integer,
        user_id -> Text,
    }
}

diesel::table! {
    project_messages (id) {
        id -> Integer,
        project_id -> Integer,
        sender_id -> Text,
        body -> Text,
        sent_at -> Timestamp,
        is_read -> Bool,
    }
}

diesel::table! {
    projects (id) {
        id -> Integer,
        name -> Text,
        description -> Text,
        part_name -> Text,
        part_number -> Text,
        customer -> Text,
        model -> Text,
        creator_id -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    tasks (id) {
        id -> Integer,
        project_id -> Integer,
        title -> Text,
        pic_id -> Text,
        delegator_id -> Text,
        due_date -> Date,
        status -> Text,
        created_at -> Timestamp,
        completed_at -> Nullable<Timestamp>,
        actual_start -> Nullable<Timestamp>,
    }
}

diesel::table! {
    users (id) {
        id -> Text,
        password_hash -> Text,
        fullname -> Text,
        department -> Text,
        section -> Text,
        role -> Text,
        status -> Text,
        created_at -> Timestamp,
    }
}

diesel::joinable!(documents -> tasks (task_id));
diesel::joinable!(project_members -> projects (project_id));
diesel::joinable!(project_members -> users (user_id));
diesel::joinable!(project_messages -> projects (project_id));
diesel::joinable!(project_messages -> users (sender_id));
diesel::joinable!(projects -> users (creator_id));
diesel::joinable!(tasks -> projects (project_id));

diesel::allow_tables_to_appear_in_same_query!(
    audit_log,
    direct_messages,
    documents,
    project_members,
    project_messages,
    projects,
    tasks,
    users,
);
