pub mod collaborators;
